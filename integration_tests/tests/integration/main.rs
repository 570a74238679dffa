mod admission;
mod meta;
mod relay;
