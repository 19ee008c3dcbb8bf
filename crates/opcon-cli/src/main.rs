use anyhow::Context;
use clap::Parser;
use opcon_client::{
    run_console_feed, ApiClient, ClientConfig, CommandDispatcher, CommandRequest, SessionHandle,
    SinkHandle, StatusPoller,
};
use opcon_core::transcript::{LineClass, Transcript};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Line-based operator console for a remote admin server.
#[derive(Parser, Debug)]
#[command(name = "opcon")]
struct Args {
    /// Server base URL (falls back to OPCON_SERVER_URL, then localhost).
    #[arg(long, default_value = "")]
    server: String,
    #[arg(long, default_value = "")]
    username: String,
    #[arg(long, default_value = "")]
    password: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cfg = ClientConfig::resolve(&args.server).context("resolving server url")?;
    let session = SessionHandle::new();
    let api = ApiClient::new(cfg.clone(), session.clone());

    if !args.username.is_empty() {
        api.authenticate(&args.username, &args.password)
            .await
            .context("authentication failed")?;
    }

    let poller = StatusPoller::new(api.clone());
    let snapshot = poller.refresh().await;
    if let Some(error) = &snapshot.error {
        eprintln!("status unavailable: {error}");
    }

    let (sink, mut sink_rx) = SinkHandle::channel(cfg.sink_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (request_tx, request_rx) = mpsc::channel::<CommandRequest>(16);

    let max_lines = cfg.transcript_max_lines;
    let printer = tokio::spawn(async move {
        let mut transcript = Transcript::new(max_lines);
        while let Some(line) = sink_rx.recv().await {
            transcript.append(&line.text, line.class);
            for segment in line.text.split('\n') {
                match line.class {
                    LineClass::Danger => eprintln!("!! {segment}"),
                    _ => println!("{segment}"),
                }
            }
        }
        transcript
    });

    let feed = tokio::spawn(run_console_feed(
        cfg.clone(),
        session.clone(),
        sink.clone(),
        poller.clone(),
        shutdown_rx.clone(),
    ));

    let dispatcher = CommandDispatcher::new(api, cfg, sink.clone(), poller);
    let dispatcher_task = tokio::spawn(dispatcher.run(request_rx, shutdown_rx));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = stdin.next_line() => line.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }

        // "send <text>" runs the two-phase protocol: arm, then dispatch.
        if input == "send" || input.starts_with("send ") {
            let text = input.strip_prefix("send").unwrap_or_default().trim();
            request_tx.send(CommandRequest::new("send")).await.ok();
            request_tx
                .send(CommandRequest::with_text("send", text))
                .await
                .ok();
        } else {
            request_tx.send(CommandRequest::new(input)).await.ok();
        }
    }

    let _ = shutdown_tx.send(true);
    drop(request_tx);
    drop(sink);

    if let Err(err) = dispatcher_task.await {
        warn!(event = "dispatcher_join_error", error = %err);
    }
    match feed.await {
        Ok(Err(err)) => warn!(event = "console_feed_error", error = %err),
        Err(err) => warn!(event = "console_feed_join_error", error = %err),
        Ok(Ok(())) => {}
    }
    let _ = printer.await;
    Ok(())
}
