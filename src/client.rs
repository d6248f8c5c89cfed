use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use log::{debug, trace, error, info, warn};

use crate::request::{ConversationBody, ResponseBody};
use crate::transcript::{ChatClient, SubmitOutcome, TranscriptEntry};

// ===== Transport =====

/// Sends one conversation body to the gateway.
/// Never fails: every problem is reported as a `SubmitOutcome`.
pub trait ChatTransport: Send + Sync + 'static
{   fn send(&self, body: ConversationBody)
      -> impl Future<Output = SubmitOutcome> + Send;
}

/// Gateway transport over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport
{   http_client: reqwest::Client
  , endpoint: String
}

impl HttpTransport
{   /// `base_url` is the server root; requests go to `/api/chat`
    pub fn new(base_url: &str) -> Self
    {   HttpTransport::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http_client: reqwest::Client, base_url: &str) -> Self
    {   let endpoint = format!("{}/api/chat", base_url.trim_end_matches('/'));
        debug!("Creating HttpTransport for {}", endpoint);
        HttpTransport
        {   http_client
          , endpoint
        }
    }
}

impl ChatTransport for HttpTransport
{   async fn send(&self, body: ConversationBody) -> SubmitOutcome
    {   trace!("Posting {} messages", body.messages.len());
        let response = match self.http_client
          .post(&self.endpoint)
          .json(&body)
          .send()
          .await
        {   Ok(r) => r
          , Err(e) => {
              error!("Chat request failed: {}", e);
              return SubmitOutcome::ConnectionFailure(e.to_string());
            }
        };

        let status = response.status();
        let text = match response.text().await
        {   Ok(t) => t
          , Err(e) => {
              error!("Unreadable chat response: {}", e);
              return SubmitOutcome::ParseFailure;
            }
        };
        if text.trim().is_empty()
        {   error!("Empty response from server ({})", status);
            return SubmitOutcome::ParseFailure;
        }
        let parsed: ResponseBody = match serde_json::from_str(&text)
        {   Ok(p) => p
          , Err(e) => {
              error!("JSON parse error: {}", e);
              return SubmitOutcome::ParseFailure;
            }
        };

        if !status.is_success()
        {   debug!("Gateway returned {}: {:?}", status, parsed.error);
            return SubmitOutcome::GatewayFailure
            {   error: parsed.error
              , message: parsed.message
              , details: parsed.details
            };
        }
        if let Some(warning) = &parsed.warning
        {   warn!("Gateway answered in degraded mode: {}", warning);
        }
        SubmitOutcome::Reply(parsed.message.or(parsed.response))
    }
}

// ===== Chat Session Actor =====

pub type SubmitReply = Result<TranscriptEntry, crate::error::Error>;

/// Commands for the ChatSession actor
pub enum SessionCommand
{   Submit
    {   text: String
      , reply: mpsc::UnboundedSender<SubmitReply>
    }
  , Transcript
    {   reply: mpsc::UnboundedSender<Vec<TranscriptEntry>>
    }
  , Shutdown
    {   reply: mpsc::UnboundedSender<()>
    }
}

/// Public chat session interface - owns the task
pub struct ChatSession
{   tx: mpsc::UnboundedSender<SessionCommand>
  , _task: JoinHandle<()>
}

impl ChatSession
{   /// Create and spawn a session around `client`
    pub fn spawn<T: ChatTransport>(transport: T, client: ChatClient) -> Self
    {   debug!("Creating ChatSession");
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(transport);

        let _task = tokio::spawn(async move {
          run_session_loop(cmd_rx, transport, client).await;
        });

        ChatSession
        {   tx: cmd_tx
          , _task
        }
    }

    /// Queue a submit - returns immediately.
    /// The receiver yields the assistant entry, or why the submit was
    /// refused.
    pub async fn submit(
      &self
    , text: impl Into<String>
    ) -> Result<mpsc::UnboundedReceiver<SubmitReply>, crate::error::Error>
    {   let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        self.tx.send(SessionCommand::Submit {
          text: text.into(),
          reply: reply_tx,
        }).map_err(|_| {
          error!("Chat session disconnected");
          crate::error::Error::Other(
            "Chat session disconnected".to_string()
          )
        })?;
        Ok(reply_rx)
    }

    /// Snapshot of the transcript
    pub async fn transcript(&self)
      -> Result<Vec<TranscriptEntry>, crate::error::Error>
    {   let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.tx.send(SessionCommand::Transcript { reply: reply_tx })
          .map_err(|_| {
            crate::error::Error::Other(
              "Chat session disconnected".to_string()
            )
          })?;
        reply_rx.recv().await.ok_or_else(|| {
          crate::error::Error::Other(
            "Chat session disconnected".to_string()
          )
        })
    }

    /// Gracefully shutdown the session
    pub async fn shutdown(self) -> Result<(), crate::error::Error>
    {   debug!("Shutting down ChatSession");
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.tx.send(SessionCommand::Shutdown { reply: reply_tx })
          .map_err(|_| {
            crate::error::Error::Other(
              "Session already shutdown".to_string()
            )
          })?;
        reply_rx.recv().await.ok_or(crate::error::Error::Timeout)
    }
}

/// Main session event loop
///
/// Commands keep flowing while a request is in flight, so a second
/// submit is refused by the state machine instead of queueing behind
/// the first.
async fn run_session_loop<T: ChatTransport>(
  mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>
, transport: Arc<T>
, mut client: ChatClient
)
{   debug!("Starting chat session loop");
    let mut in_flight: Option<(
      JoinHandle<SubmitOutcome>
    , mpsc::UnboundedSender<SubmitReply>
    )> = None;

    loop
    { tokio::select!
      { cmd = cmd_rx.recv() => match cmd
        {   Some(SessionCommand::Submit { text, reply }) => {
              match client.begin_submit(&text)
              {   Ok(body) => {
                    let transport = Arc::clone(&transport);
                    let handle = tokio::spawn(async move {
                      transport.send(body).await
                    });
                    in_flight = Some((handle, reply));
                  }
                , Err(e) => {
                    debug!("Submit refused: {}", e);
                    let _ = reply.send(Err(e));
                  }
              }
            }
          , Some(SessionCommand::Transcript { reply }) => {
              let _ = reply.send(client.transcript().to_vec());
            }
          , Some(SessionCommand::Shutdown { reply }) => {
              info!("Chat session shutting down");
              // the turn in flight still lands in the transcript
              if let Some((handle, submit_reply)) = in_flight.take()
              {   debug!("Waiting for in-flight reply before shutdown");
                  finish_turn(&mut client, handle.await, &submit_reply);
              }
              let _ = reply.send(());
              break;
            }
          , None => {
              debug!("Command channel closed");
              break;
            }
        }
      , joined = async {
          match in_flight.as_mut()
          {   Some((handle, _)) => handle.await
            , None => std::future::pending().await
          }
        }, if in_flight.is_some() => {
          if let Some((_, reply)) = in_flight.take()
          {   finish_turn(&mut client, joined, &reply);
          }
        }
      }
    }
}

/// Record the outcome of a finished transport call and answer the submitter
fn finish_turn(
  client: &mut ChatClient
, joined: Result<SubmitOutcome, tokio::task::JoinError>
, reply: &mpsc::UnboundedSender<SubmitReply>
)
{   let outcome = joined.unwrap_or_else(|e| {
      error!("Chat transport crashed: {}", e);
      SubmitOutcome::ConnectionFailure(e.to_string())
    });
    let entry = client.complete(&outcome).clone();
    let _ = reply.send(Ok(entry));
}
