/// Static bundle partitioning policy.
pub mod splitter {
    /// Tail remainders shorter than `records_per_bundle / TAIL_ABSORB_DIVISOR`
    /// fold into the final bundle instead of forming a runt bundle.
    pub const TAIL_ABSORB_DIVISOR: u64 = 4;
}

/// Conformance harness defaults.
pub mod harness {
    /// Fraction grid steps generated per record position by the exhaustive
    /// split sweep; 2 probes every boundary and every midpoint between them.
    pub const FRACTION_STEPS_PER_POSITION: u32 = 2;
    /// Contended reader-vs-controller trials per fraction in the
    /// multi-threaded sweep.
    pub const CONTENDED_TRIALS_PER_FRACTION: u32 = 8;
}
