use bitflags::bitflags;

bitflags! {
    /// Logical frame buffers carried by a frame or image.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buffers: u32 {
        const COLOR = 0x1;
        const DEPTH = 0x2;
    }
}

impl Buffers {
    /// Individual buffers in wire order: color first, then depth.
    pub const WIRE_ORDER: [Buffers; 2] = [Buffers::COLOR, Buffers::DEPTH];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_order_is_color_then_depth() {
        let all = Buffers::COLOR | Buffers::DEPTH;
        let present: Vec<_> = Buffers::WIRE_ORDER
            .into_iter()
            .filter(|b| all.contains(*b))
            .collect();
        assert_eq!(present, vec![Buffers::COLOR, Buffers::DEPTH]);
        assert_eq!(Buffers::from_bits(0x4), None);
    }
}
