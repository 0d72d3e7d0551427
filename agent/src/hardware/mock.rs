//! Scripted transport for testing drivers without hardware

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::SenseError;
use crate::hardware::i2c::I2cTransport;

/// Transaction record for test verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTransaction {
    Write(Vec<u8>),
    Read(usize),
    WriteRead { write: Vec<u8>, read_len: usize },
}

#[derive(Debug, Default)]
struct MockState {
    responses: VecDeque<Result<Vec<u8>, String>>,
    write_failures: VecDeque<String>,
    transactions: Vec<MockTransaction>,
    delayed: Duration,
}

/// Mock transport.
///
/// Reads pop pre-programmed responses in order; an empty queue behaves like
/// a device that does not acknowledge. Clones share state, so a test can
/// keep one handle while a driver owns another.
#[derive(Debug, Clone)]
pub struct MockTransport {
    address: u8,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes for the next read
    pub fn push_response(&self, data: &[u8]) -> &Self {
        self.state().responses.push_back(Ok(data.to_vec()));
        self
    }

    /// Make the next read fail
    pub fn push_read_failure(&self, detail: &str) -> &Self {
        self.state().responses.push_back(Err(detail.to_string()));
        self
    }

    /// Make the next write fail
    pub fn push_write_failure(&self, detail: &str) -> &Self {
        self.state().write_failures.push_back(detail.to_string());
        self
    }

    /// Transaction log
    pub fn transactions(&self) -> Vec<MockTransaction> {
        self.state().transactions.clone()
    }

    /// Only the writes from the transaction log
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state()
            .transactions
            .iter()
            .filter_map(|t| match t {
                MockTransaction::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_transactions(&self) {
        self.state().transactions.clear();
    }

    /// Responses not consumed yet
    pub fn pending_responses(&self) -> usize {
        self.state().responses.len()
    }

    /// Sum of all requested delays
    pub fn total_delay(&self) -> Duration {
        self.state().delayed
    }

    fn next_response(state: &mut MockState, buffer: &mut [u8]) -> Result<(), SenseError> {
        match state.responses.pop_front() {
            Some(Ok(data)) if data.len() >= buffer.len() => {
                buffer.copy_from_slice(&data[..buffer.len()]);
                Ok(())
            }
            Some(Ok(data)) => Err(SenseError::TransactionFailure(format!(
                "short read: wanted {} bytes, got {}",
                buffer.len(),
                data.len()
            ))),
            Some(Err(detail)) => Err(SenseError::TransactionFailure(detail)),
            None => Err(SenseError::TransactionFailure("no acknowledgment".to_string())),
        }
    }

    fn check_write(state: &mut MockState) -> Result<(), SenseError> {
        match state.write_failures.pop_front() {
            Some(detail) => Err(SenseError::TransactionFailure(detail)),
            None => Ok(()),
        }
    }
}

impl I2cTransport for MockTransport {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SenseError> {
        let mut state = self.state();
        state.transactions.push(MockTransaction::Write(data.to_vec()));
        Self::check_write(&mut state)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), SenseError> {
        let mut state = self.state();
        state.transactions.push(MockTransaction::Read(buffer.len()));
        Self::next_response(&mut state, buffer)
    }

    fn write_read(&mut self, data: &[u8], buffer: &mut [u8]) -> Result<(), SenseError> {
        let mut state = self.state();
        state.transactions.push(MockTransaction::WriteRead {
            write: data.to_vec(),
            read_len: buffer.len(),
        });
        Self::check_write(&mut state)?;
        Self::next_response(&mut state, buffer)
    }

    fn delay(&mut self, duration: Duration) {
        self.state().delayed += duration;
    }
}
