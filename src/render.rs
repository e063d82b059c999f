//! Terminal rendering of mode responses and transcripts.

use colored::*;

use crate::history::{ChatEntry, Sender};
use crate::modes::{Canvas, Mode, ModeResponse};

pub fn header(mode: Mode, model: &str) -> String {
    let info = mode.info();
    format!(
        "{} {} {}",
        info.icon,
        info.name.bright_cyan().bold(),
        format!("[{}]", model).dimmed()
    )
}

/// Chat text followed by the canvas, if any.
pub fn response(mode: Mode, resp: &ModeResponse) -> String {
    let mut out = format!("{} {}\n", mode.info().icon, resp.text);
    if let Some(canvas) = &resp.canvas {
        out.push('\n');
        out.push_str(&self::canvas(canvas));
    }
    out
}

pub fn canvas(canvas: &Canvas) -> String {
    let rule = "─".repeat(60).dimmed().to_string();
    let mut out = String::new();
    match canvas {
        Canvas::Code { language, code, description } => {
            out.push_str(&format!("{} {}\n{}\n", description.bright_green().bold(), format!("({})", language).dimmed(), rule));
            out.push_str(code);
            out.push('\n');
        }
        Canvas::Writing { title, sections } => {
            out.push_str(&format!("{}\n{}\n", title.bright_blue().bold(), rule));
            for section in sections {
                out.push_str(&section.content);
                out.push_str("\n\n");
            }
        }
        Canvas::Image { images } => {
            out.push_str(&format!("{}\n{}\n", "Images".bright_magenta().bold(), rule));
            for image in images {
                out.push_str(&format!(
                    "{} {} {}x{} {}\n",
                    image.placeholder,
                    image.url.underline(),
                    image.width,
                    image.height,
                    format!("({})", image.source).dimmed()
                ));
            }
        }
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

pub fn transcript(entries: &[ChatEntry]) -> String {
    if entries.is_empty() {
        return "No chat history.\n".dimmed().to_string();
    }
    entries
        .iter()
        .map(|e| {
            let who = match e.sender {
                Sender::User => "you".bright_yellow().bold(),
                Sender::Bot => e.mode.info().name.bright_cyan().bold(),
            };
            format!("{} {}: {}\n", e.mode.info().icon, who, e.text)
        })
        .collect()
}

pub fn mode_list() -> String {
    Mode::ALL
        .iter()
        .map(|m| {
            let info = m.info();
            format!("{} {:<14} {}\n", info.icon, m.id().bold(), info.description.dimmed())
        })
        .collect()
}
