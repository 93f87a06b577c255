//! Simulated cards.
//!
//! [`DesfireCard`] understands the handful of native commands the terminal
//! sends. Its "cryptography" is a keyed XOR, enough to tell a right key from
//! a wrong one but nothing more.

use std::collections::BTreeMap;

use heapless::Vec as AuthReply;
use log::debug;
use paystation_firmware::payment::desfire::{cmd, status, Authenticator, MAX_AUTH_REPLY};

use crate::chip::Peer;

pub type Key = [u8; 16];

const RND_LEN: usize = 16;

/// XOR with a keystream that scales each key byte by an odd position factor,
/// so two different keys never differ by a rotation-invariant pattern.
fn xor(key: &Key, data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .enumerate()
        .map(|(i, (byte, k))| byte ^ k.wrapping_mul((2 * i + 1) as u8))
        .collect()
}

fn rotate(data: &[u8]) -> Vec<u8> {
    let mut rotated = data.to_vec();
    rotated.rotate_left(1);
    rotated
}

/// ISO14443A tag without ISO14443-4, answers nothing.
#[derive(Debug, Clone)]
pub struct Tag {
    pub uid: Vec<u8>,
    pub atqa: [u8; 2],
    pub sak: u8,
}

impl Tag {
    pub fn new(uid: &[u8], atqa: [u8; 2], sak: u8) -> Self {
        Self {
            uid: uid.to_vec(),
            atqa,
            sak,
        }
    }
}

impl Peer for Tag {
    fn uid(&self) -> Vec<u8> {
        self.uid.clone()
    }

    fn atqa(&self) -> [u8; 2] {
        self.atqa
    }

    fn sak(&self) -> u8 {
        self.sak
    }

    fn transceive(&mut self, _apdu: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Default)]
struct Application {
    key_no: u8,
    key: Key,
    values: BTreeMap<u8, i32>,
}

#[derive(Debug, Clone)]
pub struct DesfireCard {
    uid: Vec<u8>,
    applications: BTreeMap<u32, Application>,
    selected: Option<u32>,
    authenticated: bool,
    challenge: Option<Vec<u8>>,
    pending: Vec<(u8, i32)>,
    challenges_issued: u8,
}

impl DesfireCard {
    pub fn new(uid: &[u8]) -> Self {
        Self {
            uid: uid.to_vec(),
            applications: BTreeMap::new(),
            selected: None,
            authenticated: false,
            challenge: None,
            pending: Vec::new(),
            challenges_issued: 0,
        }
    }

    pub fn with_application(mut self, aid: u32, key_no: u8, key: Key) -> Self {
        self.applications.insert(
            aid,
            Application {
                key_no,
                key,
                values: BTreeMap::new(),
            },
        );
        self
    }

    /// Adds a value file to an application registered before
    pub fn with_value_file(mut self, aid: u32, file_no: u8, balance: i32) -> Self {
        if let Some(app) = self.applications.get_mut(&aid) {
            app.values.insert(file_no, balance);
        }
        self
    }

    /// Committed balance of a value file
    pub fn balance(&self, aid: u32, file_no: u8) -> Option<i32> {
        self.applications.get(&aid)?.values.get(&file_no).copied()
    }

    fn app(&self) -> Option<&Application> {
        self.applications.get(&self.selected?)
    }

    fn select(&mut self, params: &[u8]) -> Vec<u8> {
        let [a0, a1, a2] = params else {
            return vec![status::ILLEGAL_COMMAND];
        };
        let aid = u32::from_le_bytes([*a0, *a1, *a2, 0]);
        self.authenticated = false;
        self.pending.clear();
        if self.applications.contains_key(&aid) {
            self.selected = Some(aid);
            vec![status::OPERATION_OK]
        } else {
            self.selected = None;
            vec![status::APPLICATION_NOT_FOUND]
        }
    }

    fn authenticate(&mut self, params: &[u8]) -> Vec<u8> {
        self.authenticated = false;
        let Some(app) = self.app() else {
            return vec![status::PERMISSION_DENIED];
        };
        if params != [app.key_no] {
            return vec![status::AUTHENTICATION_ERROR];
        }
        let key = app.key;

        self.challenges_issued = self.challenges_issued.wrapping_add(1);
        let rnd_b: Vec<u8> = (0..RND_LEN as u8)
            .map(|i| i.wrapping_mul(31).wrapping_add(self.challenges_issued))
            .collect();
        let mut answer = vec![status::ADDITIONAL_FRAME];
        answer.extend(xor(&key, &rnd_b));
        self.challenge = Some(rnd_b);
        answer
    }

    fn finish_authentication(&mut self, params: &[u8]) -> Vec<u8> {
        let (Some(rnd_b), Some(app)) = (self.challenge.take(), self.app()) else {
            return vec![status::ILLEGAL_COMMAND];
        };
        if params.len() != 2 * RND_LEN {
            return vec![status::AUTHENTICATION_ERROR];
        }
        let plain = xor(&app.key, params);
        let (rnd_a, rnd_b_rotated) = plain.split_at(RND_LEN);
        if rnd_b_rotated != rotate(&rnd_b) {
            debug!("Card rejected authentication reply");
            return vec![status::AUTHENTICATION_ERROR];
        }
        let proof = xor(&app.key, &rotate(rnd_a));
        self.authenticated = true;

        let mut answer = vec![status::OPERATION_OK];
        answer.extend(proof);
        answer
    }

    fn value_file(&self, file_no: u8) -> Result<i32, u8> {
        if !self.authenticated {
            return Err(status::AUTHENTICATION_ERROR);
        }
        self.app()
            .and_then(|app| app.values.get(&file_no).copied())
            .ok_or(status::FILE_NOT_FOUND)
    }

    fn get_value(&self, params: &[u8]) -> Vec<u8> {
        let [file_no] = params else {
            return vec![status::ILLEGAL_COMMAND];
        };
        match self.value_file(*file_no) {
            Ok(value) => {
                let mut answer = vec![status::OPERATION_OK];
                answer.extend_from_slice(&value.to_le_bytes());
                answer
            }
            Err(code) => vec![code],
        }
    }

    fn debit(&mut self, params: &[u8]) -> Vec<u8> {
        let [file_no, v0, v1, v2, v3] = params else {
            return vec![status::ILLEGAL_COMMAND];
        };
        let amount = i32::from_le_bytes([*v0, *v1, *v2, *v3]);
        let balance = match self.value_file(*file_no) {
            Ok(balance) => balance,
            Err(code) => return vec![code],
        };
        let staged: i32 = self
            .pending
            .iter()
            .filter(|(file, _)| file == file_no)
            .map(|(_, amount)| amount)
            .sum();
        if amount < 0 || balance - staged - amount < 0 {
            return vec![status::BOUNDARY_ERROR];
        }
        self.pending.push((*file_no, amount));
        vec![status::OPERATION_OK]
    }

    fn commit(&mut self) -> Vec<u8> {
        let Some(aid) = self.selected else {
            return vec![status::PERMISSION_DENIED];
        };
        let pending = std::mem::take(&mut self.pending);
        if let Some(app) = self.applications.get_mut(&aid) {
            for (file_no, amount) in pending {
                if let Some(value) = app.values.get_mut(&file_no) {
                    *value -= amount;
                }
            }
        }
        vec![status::OPERATION_OK]
    }
}

impl Peer for DesfireCard {
    fn uid(&self) -> Vec<u8> {
        self.uid.clone()
    }

    fn atqa(&self) -> [u8; 2] {
        [0x03, 0x44]
    }

    fn sak(&self) -> u8 {
        0x20
    }

    fn ats(&self) -> Vec<u8> {
        vec![0x75, 0x77, 0x81, 0x02, 0x80]
    }

    fn transceive(&mut self, apdu: &[u8]) -> Vec<u8> {
        let Some((&command, params)) = apdu.split_first() else {
            return vec![status::ILLEGAL_COMMAND];
        };
        match command {
            cmd::SELECT_APPLICATION => self.select(params),
            cmd::AUTHENTICATE_AES => self.authenticate(params),
            cmd::ADDITIONAL_FRAME => self.finish_authentication(params),
            cmd::GET_VALUE => self.get_value(params),
            cmd::DEBIT => self.debit(params),
            cmd::COMMIT_TRANSACTION => self.commit(),
            cmd::ABORT_TRANSACTION => {
                self.pending.clear();
                vec![status::OPERATION_OK]
            }
            _ => vec![status::ILLEGAL_COMMAND],
        }
    }
}

/// Terminal side of the keyed XOR handshake [`DesfireCard`] speaks.
#[derive(Debug, Clone)]
pub struct SimAuthenticator {
    key: Key,
    rnd_a: [u8; RND_LEN],
}

impl SimAuthenticator {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            rnd_a: core::array::from_fn(|i| 0xA0 ^ i as u8),
        }
    }
}

impl Authenticator for SimAuthenticator {
    fn respond(&mut self, _key_no: u8, challenge: &[u8]) -> Option<AuthReply<u8, MAX_AUTH_REPLY>> {
        if challenge.len() != RND_LEN {
            return None;
        }
        let rnd_b = xor(&self.key, challenge);
        let mut plain = self.rnd_a.to_vec();
        plain.extend(rotate(&rnd_b));
        AuthReply::from_slice(&xor(&self.key, &plain)).ok()
    }

    fn confirm(&mut self, proof: &[u8]) -> bool {
        xor(&self.key, proof) == rotate(&self.rnd_a)
    }
}
