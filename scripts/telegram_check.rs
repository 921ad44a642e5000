// Quick diagnostic: verify the Telegram bot token and, optionally, delivery to the alerts chat
// Run: cargo run --bin telegram_check [-- --send]

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN");
    let api_base = std::env::var("TELEGRAM_API_BASE")
        .unwrap_or_else(|_| "https://api.telegram.org".to_string());
    let send = std::env::args().any(|arg| arg == "--send");

    let client = reqwest::Client::new();
    let base = format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token);

    // 1. Verify token
    println!("1. Checking bot token (getMe)...");
    let me_resp = client
        .get(format!("{}/getMe", base))
        .send()
        .await
        .expect("getMe request failed");

    let me_status = me_resp.status();
    let me_body: serde_json::Value = me_resp.json().await.expect("parse getMe");

    if !me_body["ok"].as_bool().unwrap_or(false) {
        println!(
            "   FAIL: getMe returned {}: {}",
            me_status,
            me_body["description"].as_str().unwrap_or("(no description)")
        );
        return;
    }

    let username = me_body["result"]["username"].as_str().unwrap_or("?");
    println!("   OK. Bot: @{}", username);
    if let Ok(expected) = std::env::var("TELEGRAM_BOT_USERNAME") {
        if !expected.trim_start_matches('@').eq_ignore_ascii_case(username) {
            println!("   WARN: TELEGRAM_BOT_USERNAME is {}", expected);
        }
    }

    if !send {
        println!("\nSkipping test message (pass --send to post one).");
        return;
    }

    // 2. Send a test message
    let chat_id = std::env::var("ALERTS_CHAT_TELEGRAM_ID").expect("ALERTS_CHAT_TELEGRAM_ID");
    println!("\n2. Sending test message to chat {}...", chat_id);
    let send_resp = client
        .post(format!("{}/sendMessage", base))
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "text": "grafana-relay test message\nIf you can read this, alerts will arrive here.",
        }))
        .send()
        .await
        .expect("sendMessage request failed");

    let send_status = send_resp.status();
    let send_body: serde_json::Value = send_resp.json().await.expect("parse sendMessage");

    if send_body["ok"].as_bool().unwrap_or(false) {
        println!("   OK. Message delivered.");
    } else {
        println!(
            "   FAIL: sendMessage returned {} (error code {}): {}",
            send_status,
            send_body["error_code"],
            send_body["description"].as_str().unwrap_or("(no description)")
        );
    }
}
