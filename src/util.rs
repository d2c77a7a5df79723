/// Elements with a width (eg. long and double parameters take up two slots)
pub trait Width {
    fn width(&self) -> usize;
}

/// Round `value` up to the next multiple of `align` (which must be a power of two)
pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
