/// Metric names shared by the sampling core and the exporters.
#[derive(Debug, Clone, Copy)]
pub struct Tag {
    pub metric: &'static str,
}

pub const COMBINED_POSITION: Tag = Tag {
    metric: "quadbridge_combined_position_ticks",
};

pub const GRAY_PHASE: Tag = Tag {
    metric: "quadbridge_gray_phase",
};

pub const STEPS_PER_SAMPLE: Tag = Tag {
    metric: "quadbridge_steps_per_sample",
};

pub const OUTPUT_LINE_A: Tag = Tag {
    metric: "quadbridge_output_line_a",
};

pub const OUTPUT_LINE_B: Tag = Tag {
    metric: "quadbridge_output_line_b",
};
