//! Line-based speech engine
//!
//! Treats each non-empty input line as one final transcript segment. Used by
//! the CLI (reading stdin) and by tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::engine::{
    RecognitionError, RecognitionSession, SessionEvent, SessionEventSender, SessionOptions,
    SpeechEngine, SpeechError, TranscriptSegment,
};
use crate::capability::Capability;

type LineReader = Box<dyn AsyncBufRead + Send + Unpin>;

/// Speech engine fed by lines of text
pub struct LineSpeechEngine {
    input: Arc<tokio::sync::Mutex<Lines<LineReader>>>,
    exhausted: Arc<AtomicBool>,
    closed: Arc<Notify>,
}

impl LineSpeechEngine {
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let reader: LineReader = Box::new(reader);
        Self {
            input: Arc::new(tokio::sync::Mutex::new(reader.lines())),
            exhausted: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(Notify::new()),
        }
    }

    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }

    /// Resolves once the input has reached end of file
    pub async fn closed(&self) {
        if self.exhausted.load(Ordering::SeqCst) {
            return;
        }
        self.closed.notified().await;
    }
}

impl SpeechEngine for LineSpeechEngine {
    fn probe(&self) -> Capability {
        Capability::Supported
    }

    fn create_session(
        &self,
        options: &SessionOptions,
        events: SessionEventSender,
    ) -> Result<Box<dyn RecognitionSession>, SpeechError> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(SpeechError::SessionCreation("input closed".to_string()));
        }
        tracing::debug!("Line recognition session created ({})", options.language);
        Ok(Box::new(LineSession {
            input: Arc::clone(&self.input),
            exhausted: Arc::clone(&self.exhausted),
            closed: Arc::clone(&self.closed),
            events,
            task: None,
        }))
    }
}

struct LineSession {
    input: Arc<tokio::sync::Mutex<Lines<LineReader>>>,
    exhausted: Arc<AtomicBool>,
    closed: Arc<Notify>,
    events: SessionEventSender,
    task: Option<JoinHandle<()>>,
}

impl RecognitionSession for LineSession {
    fn start(&mut self) -> Result<(), SpeechError> {
        if self.exhausted.load(Ordering::SeqCst) {
            return Err(SpeechError::StartFailed("input closed".to_string()));
        }
        if self.task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Ok(());
        }

        let input = Arc::clone(&self.input);
        let exhausted = Arc::clone(&self.exhausted);
        let closed = Arc::clone(&self.closed);
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            let _ = events.send(SessionEvent::Started);
            let mut lines = input.lock().await;
            let mut index = 0u32;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        // Finals are concatenated, so later segments carry their own separator
                        let text = if index == 0 {
                            line.to_string()
                        } else {
                            format!(" {}", line)
                        };
                        let _ = events.send(SessionEvent::Transcript(
                            TranscriptSegment::final_result(index, text),
                        ));
                        index += 1;
                    }
                    Ok(None) => {
                        tracing::info!("Speech input closed");
                        exhausted.store(true, Ordering::SeqCst);
                        closed.notify_one();
                        break;
                    }
                    Err(e) => {
                        let _ = events.send(SessionEvent::Error(RecognitionError::Other(
                            e.to_string(),
                        )));
                        break;
                    }
                }
            }
            let _ = events.send(SessionEvent::Ended);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
                let _ = self.events.send(SessionEvent::Ended);
            }
        }
    }
}
