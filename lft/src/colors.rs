use owo_colors::Rgb;

pub const FG1: Rgb = Rgb(212, 49, 113);
pub const FG2: Rgb = Rgb(170, 140, 50);
