//! Chunked streaming of raster data from the device into a [`Sink`].
use crate::backend::{Backend, DeviceHandle, ReadStatus};
use crate::error::Status;
use crate::session::Session;
use crate::sink::Sink;
use tracing::{debug, info, warn};

/// Capacity of the buffer handed to every device read (64 KiB).
pub const CHUNK_CAPACITY: usize = 64 * 1024;

/// A reusable, bounded read buffer plus the length of the last read.
pub struct Chunk {
    buf: Box<[u8]>,
    len: usize,
}

impl Chunk {
    pub fn new() -> Self {
        Self::with_capacity(CHUNK_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes placed by the last read.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the reader is in the transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    Reading,
    Done,
    Failed(Status),
}

/// How a finished transfer ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Done,
    Failed(Status),
}

/// Pulls chunks from the device until it reports completion or an error.
///
/// The reader has no notion of cancellation: an abort shows up as a
/// [`Status::Cancelled`] error from the device and ends the transfer like any
/// other failure.
#[derive(Debug)]
pub struct StreamingReader {
    state: ReadState,
    total: u64,
    chunks: u64,
}

impl StreamingReader {
    pub fn new() -> Self {
        Self {
            state: ReadState::Reading,
            total: 0,
            chunks: 0,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    /// Bytes received so far, whether or not they reached the sink.
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    /// Terminal outcome, or `None` while still reading.
    pub fn outcome(&self) -> Option<ReadOutcome> {
        match self.state {
            ReadState::Reading => None,
            ReadState::Done => Some(ReadOutcome::Done),
            ReadState::Failed(status) => Some(ReadOutcome::Failed(status)),
        }
    }

    /// Reads one chunk and returns the number of bytes placed in it.
    ///
    /// Blocks for as long as the device does. Once the reader has left
    /// [`ReadState::Reading`] the device is not touched again and `0` is
    /// returned.
    pub fn read_chunk<B: Backend>(
        &mut self,
        session: &mut Session<B>,
        chunk: &mut Chunk,
    ) -> usize {
        chunk.len = 0;
        if self.state != ReadState::Reading {
            return 0;
        }

        let result = match session.handle_mut() {
            Some(handle) => handle.read(&mut chunk.buf),
            None => Err(Status::Inval),
        };

        let n = match result {
            Ok(ReadStatus::Data(n)) => n,
            Ok(ReadStatus::Done(n)) => {
                self.state = ReadState::Done;
                n
            }
            // Some drivers report completion as an end-of-file status.
            Err(Status::Eof) => {
                self.state = ReadState::Done;
                0
            }
            Err(status) => {
                warn!(%status, received = self.total, "transfer ended early");
                self.state = ReadState::Failed(status);
                0
            }
        };

        let n = n.min(chunk.capacity());
        chunk.len = n;
        self.total += n as u64;
        self.chunks += 1;
        n
    }

    /// Reads until the device finishes, writing every chunk to `sink`.
    ///
    /// `on_progress` receives the running byte total after every chunk. A
    /// failing sink does not stop the transfer: the device is still drained
    /// so it returns to idle.
    pub fn drain<B, F>(
        &mut self,
        session: &mut Session<B>,
        sink: &mut Sink,
        mut on_progress: F,
    ) -> ReadOutcome
    where
        B: Backend,
        F: FnMut(u64),
    {
        let mut chunk = Chunk::new();

        loop {
            let n = self.read_chunk(session, &mut chunk);
            if n > 0 {
                if let Err(err) = sink.append_chunk(chunk.as_bytes()) {
                    warn!(%err, "output disabled, still draining device");
                }
                on_progress(self.total);
            }

            if let Some(outcome) = self.outcome() {
                match outcome {
                    ReadOutcome::Done => {
                        info!(bytes = self.total, chunks = self.chunks, "transfer complete")
                    }
                    ReadOutcome::Failed(status) => {
                        debug!(%status, bytes = self.total, "transfer failed")
                    }
                }
                return outcome;
            }
        }
    }
}

impl Default for StreamingReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RawParameters;
    use crate::cancel::CancelToken;
    use crate::device::DeviceInfo;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays a fixed list of read results and counts device reads.
    struct Script {
        steps: VecDeque<Result<ReadStatus, Status>>,
        reads: Rc<Cell<u32>>,
    }

    struct ScriptHandle(Script);

    impl Backend for Script {
        type Handle = ScriptHandle;

        fn init(&mut self) -> Result<(), Status> {
            Ok(())
        }

        fn open(&mut self, _name: &str, _cancel: CancelToken) -> Result<ScriptHandle, Status> {
            Ok(ScriptHandle(Script {
                steps: std::mem::take(&mut self.steps),
                reads: self.reads.clone(),
            }))
        }

        fn devices(&self) -> Vec<DeviceInfo> {
            Vec::new()
        }

        fn exit(&mut self) {}
    }

    impl DeviceHandle for ScriptHandle {
        fn start(&mut self) -> Result<(), Status> {
            Ok(())
        }

        fn parameters(&self) -> Result<RawParameters, Status> {
            Ok(RawParameters::default())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<ReadStatus, Status> {
            self.0.reads.set(self.0.reads.get() + 1);
            let step = self.0.steps.pop_front().unwrap_or(Err(Status::IoError));
            if let Ok(ReadStatus::Data(n) | ReadStatus::Done(n)) = step {
                buf[..n].fill(0xab);
            }
            step
        }

        fn close(&mut self) {}
    }

    fn open(steps: Vec<Result<ReadStatus, Status>>) -> (Session<Script>, Rc<Cell<u32>>) {
        let reads = Rc::new(Cell::new(0));
        let backend = Script {
            steps: steps.into(),
            reads: reads.clone(),
        };
        let mut session = Session::initialize(backend, CancelToken::new()).unwrap();
        session.open("").unwrap();
        (session, reads)
    }

    #[test]
    fn done_with_trailing_bytes_counts_them() {
        let (mut session, _) = open(vec![Ok(ReadStatus::Data(10)), Ok(ReadStatus::Done(5))]);
        let mut reader = StreamingReader::new();
        let mut chunk = Chunk::with_capacity(16);

        assert_eq!(reader.read_chunk(&mut session, &mut chunk), 10);
        assert_eq!(reader.state(), ReadState::Reading);
        assert_eq!(reader.read_chunk(&mut session, &mut chunk), 5);
        assert_eq!(chunk.as_bytes(), &[0xab; 5]);
        assert_eq!(reader.state(), ReadState::Done);
        assert_eq!(reader.total_bytes(), 15);
    }

    #[test]
    fn eof_status_is_completion() {
        let (mut session, _) = open(vec![Ok(ReadStatus::Data(3)), Err(Status::Eof)]);
        let mut reader = StreamingReader::new();

        let outcome = reader.drain(&mut session, &mut Sink::none(), |_| {});
        assert_eq!(outcome, ReadOutcome::Done);
        assert_eq!(reader.total_bytes(), 3);
    }

    #[test]
    fn error_status_fails_and_stops_reading() {
        let (mut session, reads) = open(vec![
            Ok(ReadStatus::Data(8)),
            Err(Status::Jammed),
            Ok(ReadStatus::Data(8)),
        ]);
        let mut reader = StreamingReader::new();
        let mut chunk = Chunk::with_capacity(8);

        reader.read_chunk(&mut session, &mut chunk);
        assert_eq!(reader.read_chunk(&mut session, &mut chunk), 0);
        assert_eq!(reader.state(), ReadState::Failed(Status::Jammed));

        assert_eq!(reader.read_chunk(&mut session, &mut chunk), 0);
        assert!(chunk.is_empty());
        assert_eq!(reads.get(), 2);
        assert_eq!(reader.total_bytes(), 8);
    }

    #[test]
    fn total_is_sum_of_chunks_without_a_sink() {
        let (mut session, _) = open(vec![
            Ok(ReadStatus::Data(4096)),
            Ok(ReadStatus::Data(0)),
            Ok(ReadStatus::Data(100)),
            Ok(ReadStatus::Data(4096)),
            Ok(ReadStatus::Done(7)),
        ]);
        let mut reader = StreamingReader::new();
        let mut seen = Vec::new();

        let outcome = reader.drain(&mut session, &mut Sink::none(), |total| seen.push(total));
        assert_eq!(outcome, ReadOutcome::Done);
        assert_eq!(reader.total_bytes(), 4096 + 100 + 4096 + 7);
        assert_eq!(seen, vec![4096, 4196, 8292, 8299]);
    }

    #[test]
    fn read_without_open_handle_fails() {
        let (mut session, reads) = open(vec![Ok(ReadStatus::Data(1))]);
        session.close();
        let mut reader = StreamingReader::new();

        assert_eq!(reader.read_chunk(&mut session, &mut Chunk::new()), 0);
        assert_eq!(reader.state(), ReadState::Failed(Status::Inval));
        assert_eq!(reads.get(), 0);
    }
}
