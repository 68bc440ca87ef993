mod accumulator;

pub use accumulator::GradientAccumulator;
