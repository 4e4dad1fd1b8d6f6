#![no_main]
use battleye_rcon::packet::{Direction, Packet};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for direction in [Direction::ClientToServer, Direction::ServerToClient] {
        if let Ok(packet) = Packet::decode(data, direction) {
            let buf = packet.encode().expect("a decoded packet must re-encode");
            let got = Packet::decode(&buf, direction).expect("re-encoded packet must decode");
            assert_eq!(packet, got);
        }
    }
});
