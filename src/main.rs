use std::sync::Arc;
use std::time::Duration;

use chatterbox::bots;
use chatterbox::channels::cli::StdoutPoster;
use chatterbox::channels::{
    CliChannel, ImapMailbox, MailAdapter, MailConfig, MicroblogAdapter, PubSubAdapter,
    PubSubConfig, pubsub, spawn_mail_poller,
};
use chatterbox::config::RouterConfig;
use chatterbox::dispatch::{Dispatcher, NoopHook};

#[tokio::main]
async fn main() -> chatterbox::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = RouterConfig::from_env()?;
    let dispatcher =
        Dispatcher::new(Arc::new(NoopHook)).with_delivery_level(config.delivery_log_level);

    eprintln!("🤖 Chatterbox v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    let mut active_channels = vec!["cli"];

    // Mail channel if an IMAP host is configured
    let mut mail_poller = None;
    if let Some(mail_config) = MailConfig::from_env()? {
        eprintln!(
            "   Mail: enabled (IMAP: {}:{}, folder: {}, every {}s)",
            mail_config.imap_host,
            mail_config.imap_port,
            mail_config.folder,
            mail_config.poll_interval_secs
        );
        let interval = Duration::from_secs(mail_config.poll_interval_secs.max(1));
        let mailbox = Arc::new(ImapMailbox::new(mail_config)?);
        let adapter = Arc::new(MailAdapter::new(
            dispatcher.clone(),
            vec![Arc::new(bots::inbox::group())],
        ));
        mail_poller = Some(spawn_mail_poller(mailbox, adapter, interval));
        active_channels.push("mail");
    }

    // Pub/sub channel if a broker URL is configured
    if let Some(pubsub_config) = PubSubConfig::from_env() {
        eprintln!(
            "   Pub/sub: enabled ({}, subject: {}, replies: {})",
            pubsub_config.url,
            pubsub_config.subject,
            pubsub_config.reply_subject.as_deref().unwrap_or("off")
        );
        let adapter = PubSubAdapter::new(
            dispatcher.clone(),
            vec![Arc::new(bots::chat_commands::group())],
        );
        let reply_subject = pubsub_config.reply_subject.clone();
        tokio::spawn(async move {
            match pubsub::connect(pubsub_config).await {
                Ok((publisher, stream)) => {
                    let adapter = match reply_subject {
                        Some(subject) => adapter.with_replies(publisher, subject),
                        None => adapter,
                    };
                    adapter.pump(stream).await;
                }
                Err(e) => tracing::error!(error = %e, "Pub/sub subscription failed"),
            }
        });
        active_channels.push("pubsub");
    }

    eprintln!("   Channels: {}\n", active_channels.join(", "));

    let microblog = MicroblogAdapter::new(
        dispatcher,
        vec![
            Arc::new(bots::math_wiz::group()),
            Arc::new(bots::knock_knock::group()),
            Arc::new(bots::hashtags::group()),
        ],
        Arc::new(StdoutPoster),
    )
    .with_prefix_replies(config.prefix_replies);

    let cli = CliChannel::new(Arc::new(microblog));
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let delivered = cli.run(stdin).await?;
    tracing::info!(delivered, "CLI session ended");

    if let Some((handle, shutdown)) = mail_poller {
        shutdown.store(true, std::sync::atomic::Ordering::Relaxed);
        handle.abort();
    }

    Ok(())
}
