//! Ogg page construction.
//!
//! A page is a 27-byte header (the segment count is its last byte), a
//! segment table of lacing values, and the packet payload. Each audio packet
//! is written as its own page run (a single page for anything that fits one
//! segment table), so a truncated stream is still decodable up to the last
//! complete page.

use crate::ogg::crc;

pub(crate) const PAGE_HEADER_SIZE: usize = 27;

/// Header-type flag: page carries the continuation of a packet started on
/// the previous page.
pub(crate) const FLAG_CONTINUATION: u8 = 0x01;
/// Header-type flag: first page of the logical stream.
pub(crate) const FLAG_BEGIN_OF_STREAM: u8 = 0x02;
/// Header-type flag: last page of the logical stream.
pub(crate) const FLAG_END_OF_STREAM: u8 = 0x04;
/// No flags: an ordinary data page.
pub(crate) const FLAG_NONE: u8 = 0x00;

/// The segment count is a single byte, so a page holds at most 255 lacing
/// values.
pub(crate) const MAX_PAGE_SEGMENTS: usize = 255;
/// Payload carried by a page whose segment table is 255 values of 255. A
/// lacing value of 255 means the packet continues, so such a page never
/// ends its packet.
pub(crate) const FULL_PAGE_PAYLOAD: usize = MAX_PAGE_SEGMENTS * 255;

/// Granule position for a page on which no packet ends.
pub(crate) const GRANULE_UNSET: u64 = u64::MAX;

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const CHECKSUM_OFFSET: usize = 22;

/// Segment table for a single packet of `len` bytes.
///
/// A packet is laced as ⌊len/255⌋ values of 255 followed by the remainder
/// (including a terminating 0 when len is a non-zero multiple of 255). A
/// zero-length payload produces an empty table: a page carrying no packet,
/// which we use as the end-of-stream marker.
pub(crate) fn lacing_values(len: usize) -> Vec<u8> {
    if len == 0 {
        return Vec::new();
    }
    let mut values = vec![255u8; len / 255];
    values.push((len % 255) as u8);
    values
}

/// Builds one complete page with its checksum patched in. The payload must
/// lace into at most 255 segments; larger packets go through
/// `build_packet_pages`.
pub(crate) fn build_page(
    payload: &[u8],
    header_type: u8,
    granule_position: u64,
    serial: u32,
    page_sequence: u32,
) -> Vec<u8> {
    assemble_page(
        payload,
        &lacing_values(payload.len()),
        header_type,
        granule_position,
        serial,
        page_sequence,
    )
}

/// Builds the page run for one packet. A packet whose segment table would
/// overflow the one-byte segment count is spread across pages: every page
/// but the last carries 255 full segments and an unset granule position,
/// and follow-on pages set the continuation flag.
pub(crate) fn build_packet_pages(
    payload: &[u8],
    header_type: u8,
    granule_position: u64,
    serial: u32,
    first_page_sequence: u32,
) -> Vec<Vec<u8>> {
    let mut pages = Vec::with_capacity(payload.len() / FULL_PAGE_PAYLOAD + 1);
    let mut flags = header_type;
    let mut sequence = first_page_sequence;
    let mut rest = payload;

    while rest.len() >= FULL_PAGE_PAYLOAD {
        let (chunk, tail) = rest.split_at(FULL_PAGE_PAYLOAD);
        pages.push(assemble_page(
            chunk,
            &[255u8; MAX_PAGE_SEGMENTS],
            flags,
            GRANULE_UNSET,
            serial,
            sequence,
        ));
        flags = FLAG_CONTINUATION;
        sequence = sequence.wrapping_add(1);
        rest = tail;
    }

    let lacing = if rest.is_empty() && !pages.is_empty() {
        // An exact multiple of the page capacity still needs a closing
        // lacing value to end the packet.
        vec![0]
    } else {
        lacing_values(rest.len())
    };
    pages.push(assemble_page(
        rest,
        &lacing,
        flags,
        granule_position,
        serial,
        sequence,
    ));
    pages
}

fn assemble_page(
    payload: &[u8],
    lacing: &[u8],
    header_type: u8,
    granule_position: u64,
    serial: u32,
    page_sequence: u32,
) -> Vec<u8> {
    debug_assert!(lacing.len() <= MAX_PAGE_SEGMENTS);
    let mut page = Vec::with_capacity(PAGE_HEADER_SIZE + lacing.len() + payload.len());

    page.extend_from_slice(CAPTURE_PATTERN);
    page.push(0); // stream structure version
    page.push(header_type);
    page.extend_from_slice(&granule_position.to_le_bytes());
    page.extend_from_slice(&serial.to_le_bytes());
    page.extend_from_slice(&page_sequence.to_le_bytes());
    page.extend_from_slice(&[0u8; 4]); // checksum placeholder
    page.push(lacing.len() as u8);
    page.extend_from_slice(lacing);
    page.extend_from_slice(payload);

    let checksum = crc::checksum(&page);
    page[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
    page
}

/// Size in bytes of the page that `build_page` produces for `len` payload
/// bytes.
pub(crate) fn page_size(payload_len: usize) -> usize {
    PAGE_HEADER_SIZE + lacing_values(payload_len).len() + payload_len
}

/// Total size of the page run `build_packet_pages` produces for `len`
/// payload bytes.
pub(crate) fn packet_size(payload_len: usize) -> usize {
    if payload_len < FULL_PAGE_PAYLOAD {
        return page_size(payload_len);
    }
    let full_pages = payload_len / FULL_PAGE_PAYLOAD;
    let remainder = payload_len % FULL_PAGE_PAYLOAD;
    let tail_lacing = if remainder == 0 {
        1
    } else {
        lacing_values(remainder).len()
    };
    full_pages * (PAGE_HEADER_SIZE + MAX_PAGE_SEGMENTS + FULL_PAGE_PAYLOAD)
        + PAGE_HEADER_SIZE
        + tail_lacing
        + remainder
}
