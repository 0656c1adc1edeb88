//! Object identifiers.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use tracewire_api::dissectors::Error;

/// An ordered sequence of non-negative integer arcs.
///
/// The default (empty) identifier is a prefix of nothing but itself.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct ObjectIdentifier(Vec<u32>);

impl ObjectIdentifier {
    pub fn new(arcs: Vec<u32>) -> ObjectIdentifier {
        ObjectIdentifier(arcs)
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `self` is a sub-OID of `other` when `other`'s arcs are a prefix of
    /// `self`'s. Every OID is a sub-OID of itself; the empty identifier is
    /// a sub-OID only of itself.
    pub fn is_sub_oid(&self, other: &ObjectIdentifier) -> bool {
        if self.0.is_empty() || other.0.is_empty() {
            return self.0.is_empty() && other.0.is_empty();
        }
        self.0.len() >= other.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Decode from BER content bytes: the first byte carries the first two
    /// arcs as `arc0*40 + arc1`, every later arc is a base-128 varint with
    /// the high bit marking continuation.
    pub fn from_ber(body: &[u8]) -> Result<ObjectIdentifier, Error> {
        if body.is_empty() {
            return Err(Error::MalformedTlv("empty oid body".to_string()));
        }
        let mut arcs = Vec::with_capacity(body.len() + 1);
        arcs.push(body[0] as u32 / 40);
        arcs.push(body[0] as u32 % 40);
        let mut acc: u32 = 0;
        let mut continued = false;
        for b in &body[1..] {
            if acc > u32::MAX >> 7 {
                return Err(Error::MalformedTlv("oid arc overflows u32".to_string()));
            }
            acc = acc << 7 | (b & 0x7f) as u32;
            if b & 0x80 != 0 {
                continued = true;
            } else {
                arcs.push(acc);
                acc = 0;
                continued = false;
            }
        }
        if continued {
            return Err(Error::MalformedTlv(
                "oid ends inside a multi-byte arc".to_string(),
            ));
        }
        Ok(ObjectIdentifier(arcs))
    }

    /// Encode to BER content bytes, the reverse of [`from_ber`].
    ///
    /// [`from_ber`]: ObjectIdentifier::from_ber
    pub fn to_ber(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() + 1);
        match self.0.as_slice() {
            [] => {}
            [first] => out.push((*first * 40) as u8),
            [first, second, rest @ ..] => {
                out.push((first * 40 + second) as u8);
                for arc in rest {
                    let mut stack = [0u8; 5];
                    let mut n = 0;
                    let mut v = *arc;
                    loop {
                        stack[n] = (v & 0x7f) as u8;
                        n += 1;
                        v >>= 7;
                        if v == 0 {
                            break;
                        }
                    }
                    for i in (0..n).rev() {
                        let cont = if i == 0 { 0 } else { 0x80 };
                        out.push(stack[i] | cont);
                    }
                }
            }
        }
        out
    }
}

impl Display for ObjectIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for ObjectIdentifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(ObjectIdentifier::default());
        }
        let arcs = s
            .split('.')
            .map(|a| {
                a.parse::<u32>()
                    .map_err(|_| Error::MalformedTlv(format!("bad oid arc {:?}", a)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ObjectIdentifier(arcs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(s: &str) -> ObjectIdentifier {
        s.parse().unwrap()
    }

    #[test]
    fn dotted_round_trip() {
        let o = oid("1.3.6.1.4.1.311.42");
        assert_eq!(o.to_string(), "1.3.6.1.4.1.311.42");
        assert_eq!(o.arcs(), &[1, 3, 6, 1, 4, 1, 311, 42]);
    }

    #[test]
    fn sub_oid_prefix_law() {
        let a = oid("1.3.6.1.4.1");
        let b = oid("1.3.6");
        assert!(a.is_sub_oid(&b));
        assert!(!b.is_sub_oid(&a));
        assert!(a.is_sub_oid(&a));
        assert!(!a.is_sub_oid(&oid("1.3.7")));
    }

    #[test]
    fn empty_oid_only_sub_of_itself() {
        let empty = ObjectIdentifier::default();
        assert!(empty.is_sub_oid(&empty));
        assert!(!empty.is_sub_oid(&oid("1")));
        // non-empty oids are not sub-oids of the empty one either
        assert!(!oid("1.3").is_sub_oid(&empty));
    }

    #[test]
    fn ber_first_byte_merges_two_arcs() {
        // 1.3 => 43
        let o = oid("1.3.6.1");
        assert_eq!(o.to_ber(), vec![43, 6, 1]);
        assert_eq!(ObjectIdentifier::from_ber(&[43, 6, 1]).unwrap(), o);
    }

    #[test]
    fn ber_multi_byte_arcs() {
        // 311 = 0b10_0110111 => 0x82 0x37; 65536 needs three bytes
        let o = oid("1.3.6.1.4.1.311.65536");
        let ber = o.to_ber();
        assert_eq!(ber, vec![43, 6, 1, 4, 1, 0x82, 0x37, 0x84, 0x80, 0x00]);
        assert_eq!(ObjectIdentifier::from_ber(&ber).unwrap(), o);
    }

    #[test]
    fn ber_truncated_arc() {
        let r = ObjectIdentifier::from_ber(&[43, 0x82]);
        assert!(matches!(r.unwrap_err(), Error::MalformedTlv(_)));
    }
}
