//! Wire format: one request and one reply per connection.
//!
//! Frames are a 4-byte big-endian length followed by a bincode body.
//! Requests are a closed enum, so dispatch is a plain `match` rather than
//! a tag-to-handler lookup; a frame that does not decode is answered with
//! a null reply and logged, never crashed on.

use std::io::Read;
use std::io::Write;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;

use crate::consts::MAX_FRAME_LEN;
use crate::dht::Did;
use crate::error::Error;
use crate::error::Result;
use crate::rpc::NodeRef;

/// Operations a node accepts from its peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    FindSuccessor(Did),
    FindPredecessor(Did),
    ClosestPrecedingFinger(Did),
    GetSuccessor,
    SetSuccessor(NodeRef),
    GetPredecessor,
    SetPredecessor(NodeRef),
    UpdateFingerTable(NodeRef, u32),
    AddKey(Did, Vec<u8>),
    GetData(Did),
    UpdateKeys,
}

impl Request {
    /// Stable operation name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Request::FindSuccessor(_) => "find_successor",
            Request::FindPredecessor(_) => "find_predecessor",
            Request::ClosestPrecedingFinger(_) => "closest_preceding_finger",
            Request::GetSuccessor => "get_successor",
            Request::SetSuccessor(_) => "set_successor",
            Request::GetPredecessor => "get_predecessor",
            Request::SetPredecessor(_) => "set_predecessor",
            Request::UpdateFingerTable(..) => "update_finger_table",
            Request::AddKey(..) => "add_key",
            Request::GetData(_) => "get_data",
            Request::UpdateKeys => "update_keys",
        }
    }
}

/// Single-value reply. `None` doubles as the null result of void calls and
/// of calls that failed remotely.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reply {
    Node(NodeRef),
    Predecessor(Option<NodeRef>),
    Data(Option<Vec<u8>>),
    None,
}

/// Encode `msg` and write it as one frame.
pub fn write_frame<T: Serialize>(stream: &mut impl Write, msg: &T) -> Result<()> {
    let body = bincode::serialize(msg).map_err(Error::BincodeSerialize)?;
    if body.len() > MAX_FRAME_LEN {
        return Err(Error::OversizedFrame(body.len()));
    }
    stream
        .write_all(&(body.len() as u32).to_be_bytes())
        .map_err(Error::Transport)?;
    stream.write_all(&body).map_err(Error::Transport)?;
    stream.flush().map_err(Error::Transport)?;
    Ok(())
}

/// Read one frame and decode it.
pub fn read_frame<T: DeserializeOwned>(stream: &mut impl Read) -> Result<T> {
    let mut len = [0u8; 4];
    stream.read_exact(&mut len).map_err(Error::Transport)?;
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::OversizedFrame(len));
    }
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).map_err(Error::Transport)?;
    bincode::deserialize(&body).map_err(Error::BincodeDeserialize)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let node = NodeRef::from_addr("127.0.0.1:4170".parse().unwrap());
        let request = Request::UpdateFingerTable(node, 42);

        let mut buf = Vec::new();
        write_frame(&mut buf, &request).unwrap();
        let decoded: Request = read_frame(&mut Cursor::new(buf)).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let reply = Reply::Data(Some(vec![0u8; MAX_FRAME_LEN]));
        assert!(matches!(
            write_frame(&mut Vec::new(), &reply),
            Err(Error::OversizedFrame(_))
        ));

        // A length header past the cap is refused before allocation.
        let mut buf = Vec::new();
        buf.extend_from_slice(&(u32::MAX).to_be_bytes());
        assert!(matches!(
            read_frame::<Reply>(&mut Cursor::new(buf)),
            Err(Error::OversizedFrame(_))
        ));
    }

    #[test]
    fn test_garbage_does_not_decode() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            read_frame::<Request>(&mut Cursor::new(buf)),
            Err(Error::BincodeDeserialize(_))
        ));
    }
}
