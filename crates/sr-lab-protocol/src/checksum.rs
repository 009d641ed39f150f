use sr_lab_abstract::Packet;

/// Sum of the sequence number, the ack number and every payload byte.
/// The checksum field itself is not part of the sum.
pub fn compute_checksum(packet: &Packet) -> u32 {
    packet
        .payload
        .as_bytes()
        .iter()
        .fold(
            packet.header.seq_num.wrapping_add(packet.header.ack_num),
            |sum, byte| sum.wrapping_add(*byte as u32),
        )
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.header.checksum != compute_checksum(packet)
}

/// Fill in the checksum field of an outgoing packet.
pub fn seal(mut packet: Packet) -> Packet {
    packet.header.checksum = compute_checksum(&packet);
    packet
}
