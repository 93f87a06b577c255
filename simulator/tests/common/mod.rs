//! Shared helpers for the simulator integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use paystation_firmware::nfc::Pn532;
use paystation_firmware::Config;
use paystation_simulator::{Peer, SimDelay, SimSelect, SimSpi, Simulator};

pub type Reader = Pn532<SimSpi, SimSelect, SimDelay>;

pub fn reader(sim: &Simulator) -> Reader {
    reader_with(sim, Config::default())
}

pub fn reader_with(sim: &Simulator, config: Config) -> Reader {
    let (spi, cs, delay) = sim.parts();
    Pn532::new(spi, cs, delay, config)
}

/// PN532 to host frame carrying `payload` (response code first)
pub fn response_frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u8 + 1;
    let mut frame = vec![0x00, 0x00, 0xFF, len, len.wrapping_neg(), 0xD5];
    frame.extend_from_slice(payload);
    let sum = payload.iter().fold(0xD5u8, |sum, byte| sum.wrapping_add(*byte));
    frame.push(sum.wrapping_neg());
    frame.push(0x00);
    frame
}

/// Peer answering every APDU with a fixed reply, remembering what it got
#[derive(Default)]
pub struct Scripted {
    pub reply: Vec<u8>,
    pub received: Vec<Vec<u8>>,
}

impl Scripted {
    pub fn replying(reply: &[u8]) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            reply: reply.to_vec(),
            received: Vec::new(),
        }))
    }
}

impl Peer for Scripted {
    fn uid(&self) -> Vec<u8> {
        vec![0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]
    }

    fn atqa(&self) -> [u8; 2] {
        [0x03, 0x44]
    }

    fn sak(&self) -> u8 {
        0x20
    }

    fn transceive(&mut self, apdu: &[u8]) -> Vec<u8> {
        self.received.push(apdu.to_vec());
        self.reply.clone()
    }
}
