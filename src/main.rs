use canvas_chat::cli::Args;
use canvas_chat::{render, ChatEntry, ClientConfig, ModeRegistry, ProviderClient, Sender, TranscriptStore};
use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();

    if args.list_modes {
        print!("{}", render::mode_list());
        return Ok(());
    }

    let prompt = if args.sends_message() {
        Some(args.message().ok_or("a non-empty message is required")?)
    } else {
        None
    };

    let store = if args.no_history {
        None
    } else {
        Some(TranscriptStore::open(&args.history)?)
    };

    let Some(prompt) = prompt else {
        let Some(store) = store else {
            return Err("--show-history and --clear-history need the transcript; drop --no-history".into());
        };
        if args.show_history {
            print!("{}", render::transcript(&store.load()));
        }
        if args.clear_history {
            store.clear()?;
            eprintln!("{}", "chat history cleared".bright_green());
        }
        return Ok(());
    };

    let config = ClientConfig::load(args.config.as_deref())?;
    let client = ProviderClient::new(config).map_err(|e| {
        format!("{} (set GEMINI_API_KEYS or pass --config)", e)
    })?;

    let discovery = client.init();
    if args.wait_discovery {
        if let Some(handle) = discovery {
            let _ = handle.await;
        }
    }

    let registry = ModeRegistry::new(client);
    if !args.json {
        eprintln!("{}", render::header(args.mode, &registry.client().current_model()));
    }

    let response = registry.respond(args.mode, prompt).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print!("{}", render::response(args.mode, &response));
    }

    if let Some(store) = store {
        store.push(ChatEntry::new(prompt, Sender::User, args.mode))?;
        store.push(ChatEntry::new(response.text.clone(), Sender::Bot, args.mode))?;
    }

    Ok(())
}
