// MIT License - Copyright (c) 2026 Peter Wright
// Scripted peer doubles shared by unit tests

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::time::{Duration, Instant, sleep, sleep_until};

use crate::config::PeerAddress;
use crate::transport::{Connector, Received, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    Read,
    Send(Vec<u8>),
}

/// One scripted peer action, due at an offset from the transport's start.
pub(crate) enum Step {
    Data(Duration, Vec<u8>),
    Close(Duration),
    Fail(Duration),
}

impl Step {
    fn at(&self) -> Duration {
        match self {
            Step::Data(at, _) | Step::Close(at) | Step::Fail(at) => *at,
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct PeerLog {
    ops: Arc<Mutex<Vec<Op>>>,
    closes: Arc<AtomicUsize>,
}

impl PeerLog {
    pub(crate) fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub(crate) fn sends(&self) -> Vec<Vec<u8>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Send(bytes) => Some(bytes),
                Op::Read => None,
            })
            .collect()
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Peer that replays a timed script relative to `start`.
pub(crate) struct ScriptedTransport {
    start: Instant,
    script: VecDeque<Step>,
    pub(crate) fail_sends: bool,
    log: PeerLog,
}

impl Transport for ScriptedTransport {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail_sends {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"));
        }
        self.log.ops.lock().unwrap().push(Op::Send(bytes.to_vec()));
        Ok(())
    }

    async fn receive(&mut self, max_len: usize, wait: Duration) -> io::Result<Received> {
        self.log.ops.lock().unwrap().push(Op::Read);
        let now = Instant::now();
        let due = self.script.front().map(|s| self.start + s.at());
        match due {
            Some(due) if due <= now + wait => {
                sleep_until(due).await;
                match self.script.pop_front() {
                    Some(Step::Data(at, mut bytes)) => {
                        if bytes.len() > max_len {
                            let rest = bytes.split_off(max_len);
                            self.script.push_front(Step::Data(at, rest));
                        }
                        Ok(Received::Data(bytes))
                    }
                    Some(Step::Close(_)) => Ok(Received::Closed),
                    Some(Step::Fail(_)) | None => {
                        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer"))
                    }
                }
            }
            _ => {
                sleep(wait).await;
                Ok(Received::TimedOut)
            }
        }
    }

    async fn close(&mut self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) enum Outcome {
    Accept(ScriptedTransport),
    Refuse,
    Hang,
}

/// Connector handing out scripted outcomes in order; clones share the queue.
#[derive(Clone)]
pub(crate) struct ScriptedConnector {
    outcomes: Arc<Mutex<VecDeque<Outcome>>>,
}

impl ScriptedConnector {
    pub(crate) fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
        }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self, _address: &PeerAddress) -> io::Result<ScriptedTransport> {
        let next = self.outcomes.lock().unwrap().pop_front();
        match next {
            Some(Outcome::Accept(transport)) => Ok(transport),
            Some(Outcome::Refuse) | None => Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )),
            Some(Outcome::Hang) => std::future::pending().await,
        }
    }
}

pub(crate) fn peer() -> PeerAddress {
    "14:41:05:05:88:77".parse().unwrap()
}

pub(crate) fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

pub(crate) fn scripted(script: Vec<Step>) -> (ScriptedTransport, PeerLog) {
    let log = PeerLog::default();
    let transport = ScriptedTransport {
        start: Instant::now(),
        script: script.into(),
        fail_sends: false,
        log: log.clone(),
    };
    (transport, log)
}
