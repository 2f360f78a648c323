//! Typed Future contents
//!
//! A Future moves raw bytes over the bus; [`Payload`] converts between
//! those bytes and the typed values client code deals with. Multi-byte
//! integers go over the wire most significant byte first, which is the
//! register layout used by nearly every I2C device.

/// A fixed-size value that can be sent or received over I2C
pub trait Payload: Sized {
    /// Number of bytes on the wire
    const SIZE: usize;

    /// Write this value into `buf`, which is exactly `SIZE` bytes long
    fn encode(&self, buf: &mut [u8]);

    /// Rebuild a value from `buf`, which is exactly `SIZE` bytes long
    fn decode(buf: &[u8]) -> Self;
}

impl Payload for () {
    const SIZE: usize = 0;

    fn encode(&self, _buf: &mut [u8]) {}

    fn decode(_buf: &[u8]) -> Self {}
}

macro_rules! impl_payload_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Payload for $ty {
                const SIZE: usize = core::mem::size_of::<$ty>();

                fn encode(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_be_bytes());
                }

                fn decode(buf: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    raw.copy_from_slice(buf);
                    <$ty>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_payload_int!(u8, i8, u16, i16, u32, i32);

impl<const N: usize> Payload for [u8; N] {
    const SIZE: usize = N;

    fn encode(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }

    fn decode(buf: &[u8]) -> Self {
        let mut raw = [0u8; N];
        raw.copy_from_slice(buf);
        raw
    }
}

/// Two values back to back, e.g. a register address followed by its content
impl<A: Payload, B: Payload> Payload for (A, B) {
    const SIZE: usize = A::SIZE + B::SIZE;

    fn encode(&self, buf: &mut [u8]) {
        let (head, tail) = buf.split_at_mut(A::SIZE);
        self.0.encode(head);
        self.1.encode(tail);
    }

    fn decode(buf: &[u8]) -> Self {
        let (head, tail) = buf.split_at(A::SIZE);
        (A::decode(head), B::decode(tail))
    }
}
