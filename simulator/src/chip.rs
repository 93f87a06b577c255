//! Byte level PN532 model.
//!
//! Speaks the SPI side of the chip: operation byte after chip select, status
//! polls, command frames in, ACK and response frames out. Time only moves
//! when the driver delays, so every test runs on simulated milliseconds.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::spi::{self, SpiBus};
use log::{debug, trace};

const DATA_WRITE: u8 = 0x01;
const STATUS_READ: u8 = 0x02;
const DATA_READ: u8 = 0x03;
const READY: u8 = 0x01;

const HOST_TO_PN532: u8 = 0xD4;
const PN532_TO_HOST: u8 = 0xD5;

pub const ACK: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];
/// Syntax error frame the chip sends for commands it does not know
pub const ERROR_FRAME: [u8; 8] = [0x00, 0x00, 0xFF, 0x01, 0xFF, 0x7F, 0x81, 0x00];

/// InDataExchange status: target timed out
const STATUS_TIMEOUT: u8 = 0x01;

const DEFAULT_FIRMWARE: [u8; 4] = [0x32, 0x01, 0x06, 0x07];
const DEFAULT_LATENCY_MS: u32 = 5;

/// A card in the field.
pub trait Peer {
    fn uid(&self) -> Vec<u8>;

    fn atqa(&self) -> [u8; 2];

    fn sak(&self) -> u8;

    /// Answer to select, empty for cards without ISO14443-4
    fn ats(&self) -> Vec<u8> {
        Vec::new()
    }

    fn transceive(&mut self, apdu: &[u8]) -> Vec<u8>;
}

/// Lets a test keep a handle on the card it put in the field.
impl<P: Peer> Peer for Rc<RefCell<P>> {
    fn uid(&self) -> Vec<u8> {
        self.borrow().uid()
    }

    fn atqa(&self) -> [u8; 2] {
        self.borrow().atqa()
    }

    fn sak(&self) -> u8 {
        self.borrow().sak()
    }

    fn ats(&self) -> Vec<u8> {
        self.borrow().ats()
    }

    fn transceive(&mut self, apdu: &[u8]) -> Vec<u8> {
        self.borrow_mut().transceive(apdu)
    }
}

/// Misbehaviour to inject into the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The status byte never reports ready
    NeverReady,
    /// Six zero bytes where the ACK should be
    DropAck,
    /// One ACK byte flipped
    CorruptAck,
}

struct Pending {
    bytes: Vec<u8>,
    latency_ms: u32,
}

struct Chip {
    clock_ns: u64,
    op: Option<u8>,
    written: Vec<u8>,
    read_pos: usize,
    outbox: VecDeque<Pending>,
    ready_at_ns: u64,
    latency_ms: u32,
    firmware: [u8; 4],
    target_number: u8,
    card: Option<Box<dyn Peer>>,
    inlisted: Option<u8>,
    faults: Vec<Fault>,
    omit_preamble: bool,
    raw_responses: VecDeque<Vec<u8>>,
    commands: Vec<Vec<u8>>,
    exchange_targets: Vec<u8>,
}

impl Chip {
    fn new() -> Self {
        Self {
            clock_ns: 0,
            op: None,
            written: Vec::new(),
            read_pos: 0,
            outbox: VecDeque::new(),
            ready_at_ns: 0,
            latency_ms: DEFAULT_LATENCY_MS,
            firmware: DEFAULT_FIRMWARE,
            target_number: 1,
            card: None,
            inlisted: None,
            faults: Vec::new(),
            omit_preamble: false,
            raw_responses: VecDeque::new(),
            commands: Vec::new(),
            exchange_targets: Vec::new(),
        }
    }

    fn has(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn ready(&self) -> bool {
        !self.has(Fault::NeverReady) && !self.outbox.is_empty() && self.clock_ns >= self.ready_at_ns
    }

    fn select(&mut self) {
        self.op = None;
        self.written.clear();
        self.read_pos = 0;
    }

    fn deselect(&mut self) {
        match self.op.take() {
            Some(DATA_WRITE) => {
                let written = std::mem::take(&mut self.written);
                self.on_frame(&written);
            }
            Some(DATA_READ) if self.read_pos > 0 => {
                self.outbox.pop_front();
                self.arm();
            }
            _ => {}
        }
    }

    fn write(&mut self, byte: u8) {
        match self.op {
            None => self.op = Some(byte),
            Some(DATA_WRITE) => self.written.push(byte),
            Some(_) => {}
        }
    }

    fn read(&mut self) -> u8 {
        match self.op {
            Some(STATUS_READ) => {
                if self.ready() {
                    READY
                } else {
                    0x00
                }
            }
            Some(DATA_READ) => {
                let byte = self
                    .outbox
                    .front()
                    .and_then(|frame| frame.bytes.get(self.read_pos))
                    .copied()
                    .unwrap_or(0x00);
                self.read_pos += 1;
                byte
            }
            _ => 0x00,
        }
    }

    /// Start the latency clock of the next queued frame
    fn arm(&mut self) {
        if let Some(next) = self.outbox.front() {
            self.ready_at_ns = self.clock_ns + u64::from(next.latency_ms) * 1_000_000;
        }
    }

    fn push(&mut self, bytes: Vec<u8>, latency_ms: u32) {
        self.outbox.push_back(Pending { bytes, latency_ms });
        if self.outbox.len() == 1 {
            self.arm();
        }
    }

    fn on_frame(&mut self, frame: &[u8]) {
        let Some(payload) = parse_command(frame) else {
            debug!("Ignoring malformed command frame {frame:02X?}");
            return;
        };
        trace!("Command {payload:02X?}");
        self.commands.push(payload.clone());
        // a new command aborts whatever was still queued
        self.outbox.clear();

        if self.has(Fault::DropAck) {
            self.push(vec![0x00; ACK.len()], 0);
            return;
        }
        if self.has(Fault::CorruptAck) {
            let mut ack = ACK.to_vec();
            ack[3] ^= 0xFF;
            self.push(ack, 0);
            return;
        }
        self.push(ACK.to_vec(), 0);

        let response = match self.raw_responses.pop_front() {
            Some(raw) => raw,
            None => self.respond(&payload),
        };
        self.push(response, self.latency_ms);
    }

    fn respond(&mut self, payload: &[u8]) -> Vec<u8> {
        let Some((&command, params)) = payload.split_first() else {
            return ERROR_FRAME.to_vec();
        };
        let answer = match command {
            0x02 => {
                let mut answer = vec![0x03];
                answer.extend_from_slice(&self.firmware);
                answer
            }
            0x14 => vec![0x15],
            0x32 => vec![0x33],
            0x4A => self.list_passive_target(),
            0x40 => self.data_exchange(params),
            0x52 => {
                self.inlisted = None;
                vec![0x53, 0x00]
            }
            _ => return ERROR_FRAME.to_vec(),
        };
        self.encode(&answer)
    }

    fn list_passive_target(&mut self) -> Vec<u8> {
        let Some(card) = self.card.as_ref() else {
            return vec![0x4B, 0x00];
        };
        let uid = card.uid();
        let ats = card.ats();
        let mut answer = vec![0x4B, 0x01, self.target_number];
        answer.extend_from_slice(&card.atqa());
        answer.push(card.sak());
        answer.push(uid.len() as u8);
        answer.extend_from_slice(&uid);
        if !ats.is_empty() {
            answer.push(ats.len() as u8 + 1);
            answer.extend_from_slice(&ats);
        }
        self.inlisted = Some(self.target_number);
        answer
    }

    fn data_exchange(&mut self, params: &[u8]) -> Vec<u8> {
        let Some((&target, apdu)) = params.split_first() else {
            return vec![0x41, STATUS_TIMEOUT];
        };
        self.exchange_targets.push(target);
        match self.card.as_mut() {
            Some(card) if self.inlisted == Some(target) => {
                let mut answer = vec![0x41, 0x00];
                answer.extend(card.transceive(apdu));
                answer
            }
            _ => vec![0x41, STATUS_TIMEOUT],
        }
    }

    fn encode(&self, payload: &[u8]) -> Vec<u8> {
        let len = payload.len() as u8 + 1;
        let mut frame = Vec::with_capacity(payload.len() + 8);
        if !self.omit_preamble {
            frame.push(0x00);
        }
        frame.extend_from_slice(&[0x00, 0xFF, len, len.wrapping_neg(), PN532_TO_HOST]);
        frame.extend_from_slice(payload);
        let sum = payload
            .iter()
            .fold(PN532_TO_HOST, |sum, byte| sum.wrapping_add(*byte));
        frame.push(sum.wrapping_neg());
        frame.push(0x00);
        frame
    }
}

/// Payload of a well formed host command frame
fn parse_command(frame: &[u8]) -> Option<Vec<u8>> {
    let start = frame.windows(2).position(|w| w == [0x00, 0xFF])?;
    let len = usize::from(*frame.get(start + 2)?);
    let lcs = *frame.get(start + 3)?;
    if (len as u8).wrapping_add(lcs) != 0 || len == 0 {
        return None;
    }
    let body = frame.get(start + 4..start + 4 + len)?;
    let dcs = *frame.get(start + 4 + len)?;
    let sum = body.iter().fold(dcs, |sum, byte| sum.wrapping_add(*byte));
    if body[0] != HOST_TO_PN532 || sum != 0 {
        return None;
    }
    Some(body[1..].to_vec())
}

/// Handle on a simulated PN532 and the card in front of it.
#[derive(Clone)]
pub struct Simulator {
    chip: Rc<RefCell<Chip>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            chip: Rc::new(RefCell::new(Chip::new())),
        }
    }

    /// SPI bus, chip select pin and delay source wired to this chip
    pub fn parts(&self) -> (SimSpi, SimSelect, SimDelay) {
        (
            SimSpi {
                chip: Rc::clone(&self.chip),
            },
            SimSelect {
                chip: Rc::clone(&self.chip),
            },
            SimDelay {
                chip: Rc::clone(&self.chip),
            },
        )
    }

    pub fn present_card(&self, card: impl Peer + 'static) {
        let mut chip = self.chip.borrow_mut();
        chip.card = Some(Box::new(card));
        chip.inlisted = None;
    }

    pub fn remove_card(&self) {
        let mut chip = self.chip.borrow_mut();
        chip.card = None;
        chip.inlisted = None;
    }

    pub fn set_firmware(&self, firmware: [u8; 4]) {
        self.chip.borrow_mut().firmware = firmware;
    }

    /// Target number handed out by the next inlist
    pub fn set_target_number(&self, target: u8) {
        self.chip.borrow_mut().target_number = target;
    }

    /// Processing time between the ACK and the response
    pub fn set_latency(&self, ms: u32) {
        self.chip.borrow_mut().latency_ms = ms;
    }

    pub fn inject(&self, fault: Fault) {
        self.chip.borrow_mut().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.chip.borrow_mut().faults.clear();
    }

    /// Answer the next command with `frame` verbatim instead of the model's
    /// own response. The ACK is still sent.
    pub fn respond_raw(&self, frame: &[u8]) {
        self.chip.borrow_mut().raw_responses.push_back(frame.to_vec());
    }

    /// Make `bytes` readable right away, without any command
    pub fn queue_raw(&self, bytes: &[u8]) {
        self.chip.borrow_mut().push(bytes.to_vec(), 0);
    }

    /// Leave the optional leading `00` off response frames
    pub fn omit_preamble(&self, omit: bool) {
        self.chip.borrow_mut().omit_preamble = omit;
    }

    /// Simulated time spent in delays
    pub fn elapsed_ms(&self) -> u64 {
        self.chip.borrow().clock_ns / 1_000_000
    }

    /// Payloads of every well formed command received so far
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.chip.borrow().commands.clone()
    }

    /// Target numbers addressed by data exchange commands, in order
    pub fn exchange_targets(&self) -> Vec<u8> {
        self.chip.borrow().exchange_targets.clone()
    }
}

pub struct SimSpi {
    chip: Rc<RefCell<Chip>>,
}

impl spi::ErrorType for SimSpi {
    type Error = Infallible;
}

impl SpiBus<u8> for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut chip = self.chip.borrow_mut();
        for word in words {
            *word = chip.read();
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut chip = self.chip.borrow_mut();
        for word in words {
            chip.write(*word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        self.write(write)?;
        self.read(read)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        self.read(words)
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

pub struct SimSelect {
    chip: Rc<RefCell<Chip>>,
}

impl digital::ErrorType for SimSelect {
    type Error = Infallible;
}

impl OutputPin for SimSelect {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.chip.borrow_mut().select();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.chip.borrow_mut().deselect();
        Ok(())
    }
}

pub struct SimDelay {
    chip: Rc<RefCell<Chip>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.chip.borrow_mut().clock_ns += u64::from(ns);
    }
}
