//! Leader-to-group broadcast primitives.
//!
//! Only the leader (rank 0) reads the surface file. Everything it reads that
//! influences control flow is delivered to every other rank through a
//! [`Collective`] before anyone acts on it, always in two steps: first a length,
//! then that many bytes of payload.
//!
//! Two implementations are provided:
//! - [`Solo`] - a group of one; every broadcast is the identity.
//! - [`ThreadGroup`] - an in-process group of `n` ranks connected by
//!   `crossbeam-channel` queues. Each [`ThreadComm`] handle is moved onto its own
//!   thread, exactly like one process per rank.
//!
//! Every rank must issue the same sequence of broadcasts. A follower that sees a
//! packet of the wrong kind reports a protocol divergence, and a follower whose
//! leader has gone away (after a leader-only fatal error) reports that the group
//! was torn down.

use crate::error::SurfError;
use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, unbounded};

/// A group of ranks in which rank 0 may broadcast to everyone.
pub trait Collective {
    /// This rank's index in the group.
    fn rank(&self) -> usize;

    /// Number of ranks in the group.
    fn size(&self) -> usize;

    /// Whether this rank is the one allowed to touch the file system.
    fn is_leader(&self) -> bool {
        self.rank() == 0
    }

    /// Deliver the leader's `value` to every rank. Followers pass a placeholder
    /// that is ignored.
    fn broadcast_len(&self, value: usize) -> Result<usize>;

    /// Deliver the leader's `payload` (of exactly `len` bytes, where `len` was
    /// agreed on by a previous [`broadcast_len`](Collective::broadcast_len)) to
    /// every rank. Followers pass an empty vector.
    fn broadcast_bytes(&self, payload: Vec<u8>, len: usize) -> Result<Vec<u8>>;
}

/// Broadcast one optional line of text.
///
/// `None` on the leader means end-of-stream and is sent as length 0; a line is
/// sent as `len + 1` followed by its bytes, so an empty line stays distinct
/// from end-of-stream.
pub fn broadcast_line<C: Collective + ?Sized>(
    comm: &C,
    line: Option<&str>,
) -> Result<Option<String>> {
    let n = if comm.is_leader() {
        line.map_or(0, |l| l.len() + 1)
    } else {
        0
    };
    let n = comm.broadcast_len(n)?;
    if n == 0 {
        return Ok(None);
    }
    let payload = if comm.is_leader() {
        line.unwrap_or_default().as_bytes().to_vec()
    } else {
        Vec::new()
    };
    let bytes = comm.broadcast_bytes(payload, n - 1)?;
    let text = String::from_utf8(bytes).map_err(|e| SurfError::Collective {
        detail: format!("broadcast line is not valid UTF-8: {e}"),
    })?;
    Ok(Some(text))
}

/// Broadcast a single boolean decided by the leader.
pub fn broadcast_flag<C: Collective + ?Sized>(comm: &C, flag: bool) -> Result<bool> {
    Ok(comm.broadcast_len(usize::from(flag))? != 0)
}

/// A single-rank group. Broadcasts return their input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Solo;

impl Collective for Solo {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast_len(&self, value: usize) -> Result<usize> {
        Ok(value)
    }

    fn broadcast_bytes(&self, payload: Vec<u8>, len: usize) -> Result<Vec<u8>> {
        if payload.len() != len {
            return Err(SurfError::Collective {
                detail: format!("payload of {} bytes announced as {len}", payload.len()),
            }
            .into());
        }
        Ok(payload)
    }
}

#[derive(Debug, Clone)]
enum Packet {
    Len(usize),
    Bytes(Vec<u8>),
}

enum Role {
    Leader(Vec<Sender<Packet>>),
    Follower(Receiver<Packet>),
}

/// Builder for an in-process group of ranks.
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create `size` connected handles; index `i` of the result is rank `i`.
    ///
    /// A `size` of zero is treated as one.
    pub fn new(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let (senders, receivers): (Vec<_>, Vec<_>) = (1..size).map(|_| unbounded()).unzip();
        let mut comms = Vec::with_capacity(size);
        comms.push(ThreadComm {
            rank: 0,
            size,
            role: Role::Leader(senders),
        });
        for (i, rx) in receivers.into_iter().enumerate() {
            comms.push(ThreadComm {
                rank: i + 1,
                size,
                role: Role::Follower(rx),
            });
        }
        comms
    }
}

/// One rank's handle into a [`ThreadGroup`].
pub struct ThreadComm {
    rank: usize,
    size: usize,
    role: Role,
}

impl ThreadComm {
    fn send(&self, senders: &[Sender<Packet>], packet: Packet) -> Result<()> {
        for (i, tx) in senders.iter().enumerate() {
            tx.send(packet.clone()).map_err(|_| SurfError::Collective {
                detail: format!("rank {} left the group", i + 1),
            })?;
        }
        Ok(())
    }

    fn recv(&self, rx: &Receiver<Packet>) -> Result<Packet> {
        rx.recv().map_err(|_| {
            SurfError::Collective {
                detail: format!("rank {}: collective group torn down by leader", self.rank),
            }
            .into()
        })
    }
}

impl Collective for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_len(&self, value: usize) -> Result<usize> {
        match &self.role {
            Role::Leader(senders) => {
                self.send(senders, Packet::Len(value))?;
                Ok(value)
            }
            Role::Follower(rx) => match self.recv(rx)? {
                Packet::Len(n) => Ok(n),
                Packet::Bytes(b) => Err(SurfError::Collective {
                    detail: format!(
                        "rank {}: expected a length, received {} payload bytes",
                        self.rank,
                        b.len()
                    ),
                }
                .into()),
            },
        }
    }

    fn broadcast_bytes(&self, payload: Vec<u8>, len: usize) -> Result<Vec<u8>> {
        match &self.role {
            Role::Leader(senders) => {
                if payload.len() != len {
                    return Err(SurfError::Collective {
                        detail: format!("payload of {} bytes announced as {len}", payload.len()),
                    }
                    .into());
                }
                self.send(senders, Packet::Bytes(payload.clone()))?;
                Ok(payload)
            }
            Role::Follower(rx) => match self.recv(rx)? {
                Packet::Bytes(b) if b.len() == len => Ok(b),
                Packet::Bytes(b) => Err(SurfError::Collective {
                    detail: format!(
                        "rank {}: expected {len} payload bytes, received {}",
                        self.rank,
                        b.len()
                    ),
                }
                .into()),
                Packet::Len(n) => Err(SurfError::Collective {
                    detail: format!("rank {}: expected payload, received length {n}", self.rank),
                }
                .into()),
            },
        }
    }
}
