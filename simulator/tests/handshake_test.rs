//! Handshake and single command tests against the simulated PN532.
//!
//! Covers the ACK comparison, the ready poll on simulated time and the
//! commands that only need the chip itself: firmware query, SAM
//! configuration and the wake-up sequence.

mod common;

use std::cell::RefCell;
use std::fmt;

use common::{reader, reader_with, response_frame};
use paystation_firmware::nfc::{DebugSink, Direction, Error, Pn532, Stage};
use paystation_firmware::{Config, Timing};
use paystation_simulator::chip::ACK;
use paystation_simulator::{Fault, Simulator};

/// Keeps every frame and note the driver traces
#[derive(Default)]
struct Recorder {
    frames: RefCell<Vec<(Direction, Vec<u8>)>>,
    notes: RefCell<Vec<String>>,
}

impl DebugSink for Recorder {
    fn frame(&self, direction: Direction, bytes: &[u8]) {
        self.frames.borrow_mut().push((direction, bytes.to_vec()));
    }

    fn note(&self, args: fmt::Arguments<'_>) {
        self.notes.borrow_mut().push(args.to_string());
    }
}

#[test]
fn ack_matches_exactly() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.queue_raw(&ACK);

    assert!(reader.read_ack());
}

#[test]
fn any_single_byte_perturbation_breaks_the_ack() {
    for index in 0..ACK.len() {
        for flip in [0x01, 0x80, 0xFF] {
            let sim = Simulator::new();
            let mut reader = reader(&sim);
            let mut ack = ACK;
            ack[index] ^= flip;
            sim.queue_raw(&ack);

            assert!(!reader.read_ack(), "byte {index} ^ {flip:#04x} accepted");
        }
    }
}

#[test]
fn wait_ready_gives_up_after_the_budget() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);

    let start = sim.elapsed_ms();
    assert!(!reader.wait_ready(100));
    let waited = sim.elapsed_ms() - start;
    assert!(waited >= 100, "gave up after {waited} ms");
}

#[test]
fn wait_ready_spends_the_budget_without_poll_delays() {
    let config = Config {
        timing: Timing {
            poll_interval_ms: 0,
            select_settle_ms: 0,
            ..Timing::default()
        },
        ..Config::default()
    };
    let sim = Simulator::new();
    let mut reader = reader_with(&sim, config);

    assert!(!reader.wait_ready(100));
    let waited = sim.elapsed_ms();
    assert!(waited >= 100, "gave up after {waited} ms");
}

#[test]
fn wait_ready_returns_as_soon_as_ready() {
    for timeout in [0, 1, 1000, 30_000] {
        let sim = Simulator::new();
        let mut reader = reader(&sim);
        sim.queue_raw(&ACK);

        let start = sim.elapsed_ms();
        assert!(reader.wait_ready(timeout));
        assert!(sim.elapsed_ms() - start < 10, "slow with timeout {timeout}");
    }
}

#[test]
fn firmware_version_is_big_endian() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.set_firmware([0x01, 0x02, 0x03, 0x04]);

    assert_eq!(reader.firmware_version(), Ok(0x0102_0304));
    assert_eq!(sim.commands(), vec![vec![0x02]]);
}

#[test]
fn firmware_info_decodes_fields() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.set_firmware([0x32, 0x01, 0x06, 0x07]);

    let info = reader.firmware_info().unwrap();
    assert_eq!((info.ic, info.version, info.revision, info.support), (0x32, 1, 6, 7));
}

#[test]
fn signature_mismatch_is_not_a_timeout() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    // answer code 0x05 instead of 0x03
    sim.respond_raw(&response_frame(&[0x05, 0x01, 0x02, 0x03, 0x04]));

    assert_eq!(reader.firmware_version(), Err(Error::UnexpectedFirmware));
    assert_eq!(reader.diagnostics().timeouts, 0);
}

#[test]
fn silent_chip_is_not_a_pn532() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.respond_raw(&[0x00; 13]);

    assert_eq!(reader.firmware_version(), Err(Error::UnexpectedFirmware));
}

#[test]
fn absent_chip_times_out_waiting_for_the_ack() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.inject(Fault::NeverReady);

    assert_eq!(reader.firmware_version(), Err(Error::Timeout(Stage::AwaitReady)));
    assert_eq!(reader.diagnostics().timeouts, 1);
    assert!(sim.elapsed_ms() >= 1000);
}

#[test]
fn missing_ack_aborts_the_exchange() {
    for fault in [Fault::DropAck, Fault::CorruptAck] {
        let sim = Simulator::new();
        let mut reader = reader(&sim);
        sim.inject(fault);

        assert_eq!(reader.sam_config(), Err(Error::NoAck), "{fault:?}");
        assert_eq!(reader.diagnostics().ack_failures, 1);

        sim.clear_faults();
        assert_eq!(reader.sam_config(), Ok(()));
    }
}

#[test]
fn every_wait_gets_its_own_budget() {
    let config = Config {
        ack_timeout_ms: 100,
        ..Config::default()
    };

    let sim = Simulator::new();
    let mut reader = reader_with(&sim, config);
    sim.set_latency(80);
    assert!(reader.firmware_version().is_ok());

    let sim = Simulator::new();
    let mut reader = reader_with(&sim, config);
    sim.set_latency(150);
    assert_eq!(reader.firmware_version(), Err(Error::Timeout(Stage::AwaitResponse)));
}

#[test]
fn sam_configuration_is_sent_verbatim() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);

    assert_eq!(reader.sam_config(), Ok(()));
    assert_eq!(sim.commands(), vec![vec![0x14, 0x01, 0x14, 0x01]]);
}

#[test]
fn sam_configuration_checks_the_answer() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.respond_raw(&response_frame(&[0x17]));

    assert_eq!(
        reader.sam_config(),
        Err(Error::UnexpectedResponse {
            expected: 0x15,
            found: 0x17
        })
    );
}

#[test]
fn responses_without_preamble_are_accepted() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.omit_preamble(true);
    sim.set_firmware([0x32, 0x01, 0x06, 0x07]);

    assert_eq!(reader.firmware_version(), Ok(0x3201_0607));
    assert_eq!(reader.sam_config(), Ok(()));
}

#[test]
fn passive_activation_retries_only_need_the_ack() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);

    assert_eq!(reader.set_passive_activation_retries(0x10), Ok(()));
    assert_eq!(sim.commands(), vec![vec![0x32, 0x05, 0xFF, 0x01, 0x10]]);
}

#[test]
fn begin_wakes_the_chip_and_ignores_the_probe() {
    let sim = Simulator::new();
    let mut reader = reader(&sim);
    sim.inject(Fault::DropAck);

    reader.begin();

    assert!(sim.elapsed_ms() >= 1000);
    assert_eq!(sim.commands(), vec![vec![0x02]]);
}

#[test]
fn sink_sees_command_response_and_stages() {
    let sim = Simulator::new();
    let recorder = Recorder::default();
    let (spi, cs, delay) = sim.parts();
    let mut reader = Pn532::with_sink(spi, cs, delay, Config::default(), &recorder);

    assert_eq!(reader.sam_config(), Ok(()));

    assert_eq!(
        *recorder.frames.borrow(),
        vec![
            (Direction::Command, vec![0x14, 0x01, 0x14, 0x01]),
            (
                Direction::Response,
                vec![0x00, 0x00, 0xFF, 0x02, 0xFE, 0xD5, 0x15, 0x16, 0x00]
            ),
        ]
    );
    assert_eq!(
        *recorder.notes.borrow(),
        ["Send", "AwaitReady", "ReadAck", "AwaitResponse"]
    );
}

#[test]
fn sink_sees_no_response_after_a_missing_ack() {
    let sim = Simulator::new();
    sim.inject(Fault::DropAck);
    let recorder = Recorder::default();
    let (spi, cs, delay) = sim.parts();
    let mut reader = Pn532::with_sink(spi, cs, delay, Config::default(), &recorder);

    assert_eq!(reader.firmware_version(), Err(Error::NoAck));

    assert_eq!(*recorder.frames.borrow(), vec![(Direction::Command, vec![0x02])]);
    assert_eq!(*recorder.notes.borrow(), ["Send", "AwaitReady", "ReadAck"]);
}
