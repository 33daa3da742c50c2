use std::io::Write;

use console::style;
use tokio::io::AsyncBufReadExt;

use piata_config::PiataConfig;
use piata_core::{ConversationId, PiataError, ToolResult};

use crate::service::ChatService;

pub(super) async fn cmd_chat(
    config: PiataConfig,
    user: String,
    conversation: Option<String>,
) -> piata_core::Result<()> {
    let mut conversation_id: Option<ConversationId> = match conversation {
        Some(raw) => Some(raw.parse().map_err(|e| {
            PiataError::Config(format!("invalid conversation id '{raw}': {e}"))
        })?),
        None => None,
    };

    let orchestrator = super::build_orchestrator(&config)?;
    let store = piata_memory::open_store(&config.store)?;
    let service = ChatService::new(orchestrator, store);

    println!("🛒 Piata Interactive Chat");
    println!("   Type 'exit' or Ctrl+C to quit");
    println!("   Type '/new' to start a new conversation");
    println!("   Type '/history' to show this conversation");
    println!();

    if let Some(id) = conversation_id {
        // Resume: show where we left off.
        let conv = service.store().get_or_create(&user, Some(id), "").await?;
        println!("{} {}", style("Resuming").dim(), style(&conv.title).bold());
        print_history(&service, &user, id).await?;
    }

    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        eprint!("{} ", style("you>").cyan());
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed {
            "exit" | "quit" | "/exit" => {
                println!("👋 Goodbye!");
                break;
            }
            "/new" => {
                conversation_id = None;
                println!("{}", style("Started a new conversation.").dim());
                continue;
            }
            "/history" => {
                match conversation_id {
                    Some(id) => print_history(&service, &user, id).await?,
                    None => println!("{}", style("No messages yet.").dim()),
                }
                continue;
            }
            _ => {}
        }

        match service.send(&user, conversation_id, trimmed).await {
            Ok(turn) => {
                if conversation_id.is_none() {
                    eprintln!(
                        "{}",
                        style(format!("   conversation {}", turn.conversation.id)).dim()
                    );
                }
                conversation_id = Some(turn.conversation.id);
                for result in &turn.response.tool_results {
                    print_tool_result(result);
                }
                println!("{} {}", style("piata>").green(), turn.response.reply_text);
            }
            Err(e) => println!("{}", style(format!("❌ {e}")).red()),
        }
        println!();
    }

    Ok(())
}

async fn print_history(
    service: &ChatService,
    user: &str,
    id: ConversationId,
) -> piata_core::Result<()> {
    let conv = service.store().get_or_create(user, Some(id), "").await?;
    let messages = service.store().history(&conv, None).await?;
    for message in messages {
        println!(
            "{} {}",
            style(format!("[{}]", message.role.as_str())).dim(),
            message.content
        );
    }
    Ok(())
}

fn print_tool_result(result: &ToolResult) {
    match result.error() {
        None => eprintln!("{}", style(format!("   🔧 {} ✓", result.tool_ref)).dim()),
        Some(error) => eprintln!(
            "{}",
            style(format!("   🔧 {} ❌ {}", result.tool_ref, truncate_output(error, 200))).red()
        ),
    }
}

fn truncate_output(s: &str, max: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let kept: String = flat.chars().take(max).collect();
        format!("{kept}...")
    }
}
