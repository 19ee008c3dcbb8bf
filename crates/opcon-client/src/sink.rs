use opcon_core::transcript::LineClass;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkLine {
    pub text: String,
    pub class: LineClass,
}

/// Fan-in handle for classified console lines. The rendering side owns
/// the receiver; if it goes away, lines are dropped with a warning so the
/// coordinator never sees a sink failure.
#[derive(Clone, Debug)]
pub struct SinkHandle {
    tx: mpsc::Sender<SinkLine>,
}

impl SinkHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SinkLine>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn append(&self, text: impl Into<String>, class: LineClass) {
        let line = SinkLine {
            text: text.into(),
            class,
        };
        if self.tx.send(line).await.is_err() {
            warn!(event = "sink_gone_line_dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_delivers_text_and_class() {
        let (sink, mut rx) = SinkHandle::channel(4);
        sink.append("hello", LineClass::Success).await;
        let line = rx.recv().await.expect("line");
        assert_eq!(line.text, "hello");
        assert_eq!(line.class, LineClass::Success);
    }

    #[tokio::test]
    async fn append_after_receiver_drop_does_not_fail() {
        let (sink, rx) = SinkHandle::channel(4);
        drop(rx);
        // Must not panic or error out.
        sink.append("orphan", LineClass::Info).await;
    }
}
