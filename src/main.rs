//! waterfall-bot - 命令行对话
//!
//! 入口：加载配置、初始化日志、按配置创建分类器与状态存储，然后在标准输入上运行一个会话。
//! 用法：`waterfall-bot [config.toml]`，输入 `/quit` 退出。

use std::path::PathBuf;

use anyhow::Context;
use intent_waterfall::classifier::create_classifier;
use intent_waterfall::config::load_config;
use intent_waterfall::dialog::Activity;
use intent_waterfall::dialogs::create_bot;
use intent_waterfall::observability;
use intent_waterfall::storage::create_state_store;
use tokio::io::{AsyncBufReadExt, BufReader};

const USER_ID: &str = "user";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    observability::init(&config.app.log_filter);

    let classifier = create_classifier(&config.classifier).context("Failed to create classifier")?;
    let store = create_state_store(&config.storage);
    let bot = create_bot(&config, classifier, store);

    let conversation_id = format!("cli-{}", uuid::Uuid::new_v4());
    tracing::info!("{} started, conversation {}", config.app.name, conversation_id);

    print_replies(&bot.on_turn(Activity::conversation_update(&conversation_id, USER_ID)).await);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let text = line.trim();
        if text == "/quit" {
            break;
        }
        if text.is_empty() {
            continue;
        }
        print_replies(&bot.on_turn(Activity::message(&conversation_id, USER_ID, text)).await);
    }

    Ok(())
}

fn print_replies(replies: &[Activity]) {
    for reply in replies {
        println!("bot> {}", reply.text());
        if !reply.suggested_actions.is_empty() {
            println!("     [{}]", reply.suggested_actions.join("] ["));
        }
    }
}
