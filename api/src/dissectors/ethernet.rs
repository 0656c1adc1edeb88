use nom::bytes::complete::take;
use nom::number::complete::be_u16;
use nom::IResult;

use super::Error;

pub const ETYPE_IPV4: u16 = 0x0800;
pub const ETYPE_VLAN: u16 = 0x8100;

/// Strip the 14 byte Ethernet header, unwrapping one 802.1Q VLAN tag if
/// present, and return the ethertype with the remaining bytes.
pub fn dissect(data: &[u8]) -> IResult<&[u8], u16, Error> {
    let (remain, hdr) = take(14usize)(data)?;
    let (_, etype) = be_u16(&hdr[12..])?;
    if etype != ETYPE_VLAN {
        return Ok((remain, etype));
    }

    let (remain, tag) = take(4usize)(remain)?;
    let (_, inner) = be_u16(&tag[2..])?;
    Ok((remain, inner))
}
