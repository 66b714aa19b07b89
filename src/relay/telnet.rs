//! TELNET option refusal
//!
//! Answers every option negotiation in a buffer with a refusal so naive
//! TELNET servers stop waiting for the client. The inbound buffer itself
//! is never modified.

/// Interpret As Command
pub const IAC: u8 = 255;
/// Refuse the peer performing an option
pub const DONT: u8 = 254;
/// Ask the peer to perform an option
pub const DO: u8 = 253;
/// Refuse to perform an option
pub const WONT: u8 = 252;
/// Offer to perform an option
pub const WILL: u8 = 251;

/// Build the replies for every `IAC <cmd> <opt>` found in `buf`
///
/// WILL/WONT are answered with DONT, DO/DONT with WONT. An IAC without a
/// complete command and option at the end of the buffer ends the scan;
/// sequences split across reads are not reassembled.
pub fn negotiate(buf: &[u8]) -> Vec<u8> {
    let mut replies = Vec::new();
    let mut i = 0;

    while i < buf.len() {
        if buf[i] != IAC {
            i += 1;
            continue;
        }
        let Some(&command) = buf.get(i + 1) else {
            break;
        };
        let answer = match command {
            WILL | WONT => DONT,
            DO | DONT => WONT,
            // escaped 0xFF data byte or a command without an option
            _ => {
                i += 2;
                continue;
            }
        };
        let Some(&option) = buf.get(i + 2) else {
            break;
        };
        replies.extend_from_slice(&[IAC, answer, option]);
        i += 3;
    }

    replies
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_will_answered_with_dont() {
        let buf = [IAC, WILL, 1];
        assert_eq!(negotiate(&buf), vec![IAC, DONT, 1]);
        assert_eq!(buf, [IAC, WILL, 1]);
    }

    #[test]
    fn test_each_command() {
        assert_eq!(negotiate(&[IAC, WONT, 3]), vec![IAC, DONT, 3]);
        assert_eq!(negotiate(&[IAC, DO, 24]), vec![IAC, WONT, 24]);
        assert_eq!(negotiate(&[IAC, DONT, 31]), vec![IAC, WONT, 31]);
    }

    #[test]
    fn test_sequences_inside_data() {
        let buf = b"login:\xff\xfb\x01ok\xff\xfd\x03".to_vec();
        assert_eq!(negotiate(&buf), vec![IAC, DONT, 1, IAC, WONT, 3]);
    }

    #[test]
    fn test_escaped_iac_and_other_commands_ignored() {
        // IAC IAC is a literal 0xFF; IAC NOP (241) carries no option
        assert!(negotiate(&[IAC, IAC, b'a']).is_empty());
        assert_eq!(negotiate(&[IAC, 241, IAC, DO, 5]), vec![IAC, WONT, 5]);
    }

    #[test]
    fn test_truncated_sequence_stops_scan() {
        assert!(negotiate(&[b'x', IAC]).is_empty());
        assert!(negotiate(&[IAC, WILL]).is_empty());
        assert_eq!(negotiate(&[IAC, DO, 1, IAC]), vec![IAC, WONT, 1]);
    }

    #[test]
    fn test_split_sequence_is_not_reassembled() {
        // known limitation: a triplet spanning two reads gets no answer
        let first = [b'a', IAC, WILL];
        let second = [1, b'b'];
        assert!(negotiate(&first).is_empty());
        assert!(negotiate(&second).is_empty());
    }

    #[test]
    fn test_plain_data_produces_nothing() {
        assert!(negotiate(b"hello world\n").is_empty());
        assert!(negotiate(&[]).is_empty());
    }
}
