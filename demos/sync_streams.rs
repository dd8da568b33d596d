use dotenv::dotenv;
use source_jira::{
    JsonLinesSink, LogConfig, RawConfig, SourceJira, SyncConfig, SyncMode, SyncService,
    init_logging,
};
use std::io;

/// 環境変数の設定から接続を確認し、全ストリームを JSON Lines で標準出力へ書き出す
///
/// ```text
/// export JIRA_DOMAIN=your-domain.atlassian.net
/// export JIRA_EMAIL=your-email@example.com
/// export JIRA_API_TOKEN=your-api-token
/// export JIRA_PROJECTS=ABC,DEF            # 任意
/// export JIRA_START_DATE=2024-01-01T00:00:00Z  # 任意
/// cargo run --example sync_streams
/// ```
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_logging(&LogConfig::default())?;

    let config = RawConfig::from_env()?;
    let source = SourceJira::new();

    let status = source.check_connection(&config).await?;
    if let Some(message) = status.error_message() {
        eprintln!("接続チェックに失敗しました: {}", message);
        return Ok(());
    }
    eprintln!("✅ 接続チェック成功");

    let registry = source.streams(&config)?;
    eprintln!("📋 {} ストリームを同期します", registry.len());

    let mut service = SyncService::new(SyncConfig::new().sync_mode(SyncMode::Incremental));
    let mut sink = JsonLinesSink::new(io::stdout().lock());
    let result = service.run(registry.streams(), &mut sink).await?;

    eprintln!(
        "同期完了: {} 件 ({:.1} 秒, エラー {} 件)",
        result.total_records(),
        result.duration_seconds(),
        result.error_count
    );
    for message in &result.error_messages {
        eprintln!("  - {}", message);
    }
    eprintln!("state: {}", serde_json::to_string(&result.state)?);

    Ok(())
}
