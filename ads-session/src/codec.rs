//! Streaming AMS frame codec
//!
//! ADS uses two wire framings for the same 32-byte AMS header:
//!
//! - Standard ADS over plain TCP (port 48898) prefixes every message with
//!   a 6-byte AMS/TCP header: two reserved zero bytes followed by a
//!   little-endian u32 holding `32 + payload length`.
//! - Secure ADS (port 8016) sends the AMS header directly inside the TLS
//!   tunnel; the payload length is taken from the header itself.
//!
//! The decoder reassembles frames across arbitrary read boundaries and
//! never consumes bytes of an incomplete frame.

use crate::error::AdsError;
use crate::frame::AmsFrame;
use ads_core::{AmsHeader, AMS_HEADER_SIZE};
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the AMS/TCP preamble used in TCP mode
pub const TCP_HEADER_SIZE: usize = 6;

/// Ceiling for a single frame (header plus payload)
pub const MAX_FRAME_LENGTH: usize = 4 * 1024 * 1024;

/// AMS frame codec with selectable framing
#[derive(Debug, Clone)]
pub struct AmsFrameCodec {
    include_tcp_header: bool,
}

impl AmsFrameCodec {
    /// Codec for standard ADS over plain TCP (with AMS/TCP preamble)
    pub fn tcp() -> Self {
        Self {
            include_tcp_header: true,
        }
    }

    /// Codec for Secure ADS inside a TLS tunnel (no preamble)
    pub fn raw() -> Self {
        Self {
            include_tcp_header: false,
        }
    }

    fn decode_tcp(&self, src: &mut BytesMut) -> Result<Option<AmsFrame>, AdsError> {
        if src.len() < TCP_HEADER_SIZE {
            return Ok(None);
        }

        let length = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if length < AMS_HEADER_SIZE || length > MAX_FRAME_LENGTH {
            src.clear();
            return Err(AdsError::FrameTooLong {
                length,
                max: MAX_FRAME_LENGTH,
            });
        }
        if src.len() < TCP_HEADER_SIZE + length {
            return Ok(None);
        }

        src.advance(TCP_HEADER_SIZE);
        let header_bytes = src.split_to(AMS_HEADER_SIZE);
        let header = AmsHeader::decode(&header_bytes)?;
        let payload = src.split_to(length - AMS_HEADER_SIZE).freeze();
        Ok(Some(AmsFrame { header, payload }))
    }

    fn decode_raw(&self, src: &mut BytesMut) -> Result<Option<AmsFrame>, AdsError> {
        if src.len() < AMS_HEADER_SIZE {
            return Ok(None);
        }

        let data_length = u32::from_le_bytes([src[24], src[25], src[26], src[27]]) as usize;
        let total = AMS_HEADER_SIZE + data_length;
        if total > MAX_FRAME_LENGTH {
            src.clear();
            return Err(AdsError::FrameTooLong {
                length: total,
                max: MAX_FRAME_LENGTH,
            });
        }
        if src.len() < total {
            return Ok(None);
        }

        let header_bytes = src.split_to(AMS_HEADER_SIZE);
        let header = AmsHeader::decode(&header_bytes)?;
        let payload = src.split_to(data_length).freeze();
        Ok(Some(AmsFrame { header, payload }))
    }
}

impl Decoder for AmsFrameCodec {
    type Item = AmsFrame;
    type Error = AdsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.include_tcp_header {
            self.decode_tcp(src)
        } else {
            self.decode_raw(src)
        }
    }
}

impl Encoder<AmsFrame> for AmsFrameCodec {
    type Error = AdsError;

    fn encode(&mut self, frame: AmsFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        use bytes::BufMut;

        if frame.header.length as usize != frame.payload.len() {
            return Err(AdsError::InvalidData(format!(
                "AMS header length {} does not match payload length {}",
                frame.header.length,
                frame.payload.len()
            )));
        }

        let length = AMS_HEADER_SIZE + frame.payload.len();
        if length > MAX_FRAME_LENGTH {
            return Err(AdsError::FrameTooLong {
                length,
                max: MAX_FRAME_LENGTH,
            });
        }

        if self.include_tcp_header {
            dst.reserve(TCP_HEADER_SIZE + length);
            dst.put_u16_le(0);
            dst.put_u32_le(length as u32);
        } else {
            dst.reserve(length);
        }
        frame.header.encode(dst);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ads_core::{AdsCommand, AmsAddress};
    use bytes::Bytes;

    fn sample_frame(payload_len: usize) -> AmsFrame {
        let target = AmsAddress::new("10.20.30.40.1.1".parse().unwrap(), 851);
        let source = AmsAddress::new("192.168.1.50.1.1".parse().unwrap(), 32905);
        AmsFrame::request(
            target,
            source,
            AdsCommand::Read,
            7,
            Bytes::from(vec![0xAB; payload_len]),
        )
    }

    #[test]
    fn test_tcp_mode_round_trip() {
        let mut codec = AmsFrameCodec::tcp();
        let frame = sample_frame(16);

        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), TCP_HEADER_SIZE + AMS_HEADER_SIZE + 16);
        assert_eq!(&buf[0..2], &[0, 0]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_raw_mode_round_trip() {
        let mut codec = AmsFrameCodec::raw();
        let frame = sample_frame(16);

        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), AMS_HEADER_SIZE + 16);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_tcp_mode_reassembly_across_boundaries() {
        let mut codec = AmsFrameCodec::tcp();
        let frame = sample_frame(28);

        let mut encoded = BytesMut::new();
        codec.encode(frame.clone(), &mut encoded).unwrap();
        assert_eq!(encoded.len(), 66);

        // Split crossing the preamble and the AMS header
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encoded[0..3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);

        buf.extend_from_slice(&encoded[3..8]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 8);

        buf.extend_from_slice(&encoded[8..]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_raw_mode_rejects_oversize_frame() {
        let mut codec = AmsFrameCodec::raw();
        let mut frame = sample_frame(0);
        frame.header.length = 5 * 1024 * 1024;

        let mut buf = BytesMut::new();
        frame.header.encode(&mut buf);
        assert_eq!(buf.len(), AMS_HEADER_SIZE);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, AdsError::FrameTooLong { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_tcp_mode_rejects_out_of_range_length() {
        let mut codec = AmsFrameCodec::tcp();

        // declared length below the header size
        let mut buf = BytesMut::from(&[0u8, 0, 16, 0, 0, 0, 1, 2, 3][..]);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, AdsError::FrameTooLong { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_raw_mode_under_read_consumes_nothing() {
        let mut codec = AmsFrameCodec::raw();
        let frame = sample_frame(16);

        let mut encoded = BytesMut::new();
        codec.encode(frame, &mut encoded).unwrap();

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encoded[..AMS_HEADER_SIZE + 4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), AMS_HEADER_SIZE + 4);
    }
}
