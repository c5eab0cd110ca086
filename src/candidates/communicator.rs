//! Minimal ring communication used to redistribute cutter elements between ranks.
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunicationError {
    /// The neighboring rank is no longer reachable.
    Disconnected { rank: usize },
    /// A received payload could not be decoded.
    MalformedPayload(String),
}

impl Display for CommunicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommunicationError::Disconnected { rank } => write!(f, "Rank {} is disconnected from the ring.", rank),
            CommunicationError::MalformedPayload(msg) => write!(f, "Received malformed payload: {}", msg),
        }
    }
}

impl Error for CommunicationError {}

/// A group of ranks arranged in a ring.
///
/// Implementors only provide the ring shift; the collectives are built on top of it.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Sends `payload` to rank `rank + 1` and returns the payload sent by rank `rank - 1`
    /// (both modulo `size`).
    fn ring_exchange(&self, payload: Vec<u8>) -> Result<Vec<u8>, CommunicationError>;

    fn next_rank(&self) -> usize {
        (self.rank() + 1) % self.size()
    }

    fn previous_rank(&self) -> usize {
        (self.rank() + self.size() - 1) % self.size()
    }

    /// Gathers the payload of every rank, indexed by rank, using `size - 1` ring shifts.
    fn all_gather(&self, payload: Vec<u8>) -> Result<Vec<Vec<u8>>, CommunicationError> {
        let size = self.size();
        let mut gathered = vec![Vec::new(); size];
        gathered[self.rank()] = payload.clone();
        let mut current = payload;
        for round in 1..size {
            current = self.ring_exchange(current)?;
            gathered[(self.rank() + size - round) % size] = current.clone();
        }
        Ok(gathered)
    }

    /// Sum of `value` over all ranks with a lower rank than this one.
    fn exclusive_prefix_sum(&self, value: usize) -> Result<usize, CommunicationError> {
        let values = gather_usize(self, value)?;
        Ok(values[..self.rank()].iter().sum())
    }

    /// Sum of `value` over all ranks.
    fn all_reduce_sum(&self, value: usize) -> Result<usize, CommunicationError> {
        Ok(gather_usize(self, value)?.iter().sum())
    }
}

fn gather_usize<C: Communicator + ?Sized>(comm: &C, value: usize) -> Result<Vec<usize>, CommunicationError> {
    let gathered = comm.all_gather((value as u64).to_le_bytes().to_vec())?;
    gathered
        .iter()
        .map(|bytes| {
            let bytes: [u8; 8] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| CommunicationError::MalformedPayload(format!("expected 8 bytes, got {}", bytes.len())))?;
            Ok(u64::from_le_bytes(bytes) as usize)
        })
        .collect()
}

/// The trivial communicator of a single rank.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SelfCommunicator;

impl Communicator for SelfCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn ring_exchange(&self, payload: Vec<u8>) -> Result<Vec<u8>, CommunicationError> {
        Ok(payload)
    }
}

/// In-process ranks connected by channels, for running several ranks as threads.
#[derive(Debug)]
pub struct ThreadRing {
    rank: usize,
    size: usize,
    to_next: Sender<Vec<u8>>,
    from_previous: Receiver<Vec<u8>>,
}

impl ThreadRing {
    /// Creates `size` connected ranks. Each communicator is intended to be moved to its own thread.
    pub fn create(size: usize) -> Vec<ThreadRing> {
        let channels: Vec<(Sender<Vec<u8>>, Receiver<Vec<u8>>)> = (0..size).map(|_| unbounded()).collect();
        // Channel `i` carries messages into rank `i`
        (0..size)
            .map(|rank| ThreadRing {
                rank,
                size,
                to_next: channels[(rank + 1) % size].0.clone(),
                from_previous: channels[rank].1.clone(),
            })
            .collect()
    }
}

impl Communicator for ThreadRing {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn ring_exchange(&self, payload: Vec<u8>) -> Result<Vec<u8>, CommunicationError> {
        self.to_next
            .send(payload)
            .map_err(|_| CommunicationError::Disconnected { rank: self.next_rank() })?;
        self.from_previous
            .recv()
            .map_err(|_| CommunicationError::Disconnected {
                rank: self.previous_rank(),
            })
    }
}

#[cfg(feature = "mpi")]
pub use self::mpi_ring::MpiCommunicator;

#[cfg(feature = "mpi")]
mod mpi_ring {
    use super::{CommunicationError, Communicator};
    use mpi::point_to_point::{Destination, Source};
    use mpi::request::WaitGuard;
    use mpi::topology::Communicator as MpiTopology;

    /// Ring communication over an MPI communicator.
    pub struct MpiCommunicator<C: MpiTopology> {
        comm: C,
    }

    impl<C: MpiTopology> MpiCommunicator<C> {
        pub fn new(comm: C) -> Self {
            Self { comm }
        }
    }

    impl<C: MpiTopology> Communicator for MpiCommunicator<C> {
        fn rank(&self) -> usize {
            self.comm.rank() as usize
        }

        fn size(&self) -> usize {
            self.comm.size() as usize
        }

        fn ring_exchange(&self, payload: Vec<u8>) -> Result<Vec<u8>, CommunicationError> {
            let next = self.comm.process_at_rank(self.next_rank() as i32);
            let previous = self.comm.process_at_rank(self.previous_rank() as i32);
            let received = mpi::request::scope(|scope| {
                let _guard = WaitGuard::from(next.immediate_send(scope, &payload[..]));
                let (received, _status) = previous.receive_vec::<u8>();
                received
            });
            Ok(received)
        }
    }
}
