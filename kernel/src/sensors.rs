// Ambient light from an LDR divider
//
// 3V3 -> LDR -> ADC node -> 10K -> GND, so more light means a higher
// node voltage. ADC with 11dB attenuation reads 0..2500mV; the usable
// swing on a typical GL5528 is roughly 150mV (covered) to 2400mV (desk
// lamp). Linear approximation between the two.

const DARK_MV: u32 = 150;
const BRIGHT_MV: u32 = 2400;

pub fn light_percent(node_mv: u16) -> u8 {
    let mv = node_mv as u32;
    if mv >= BRIGHT_MV {
        100
    } else if mv <= DARK_MV {
        0
    } else {
        ((mv - DARK_MV) * 100 / (BRIGHT_MV - DARK_MV)) as u8
    }
}

pub fn light_label(percent: u8) -> &'static str {
    match percent {
        0..=14 => "dark",
        15..=59 => "dim",
        _ => "bright",
    }
}

/// Integer exponential moving average: avg += (x - avg) / 2^SHIFT.
/// Kept scaled by 2^SHIFT internally so small steps are not lost.
pub struct Smoother<const SHIFT: u32> {
    acc: u32,
    primed: bool,
}

impl<const SHIFT: u32> Smoother<SHIFT> {
    pub const fn new() -> Self {
        Self {
            acc: 0,
            primed: false,
        }
    }

    pub fn push(&mut self, sample: u16) -> u16 {
        let scaled = (sample as u32) << SHIFT;
        if !self.primed {
            self.acc = scaled;
            self.primed = true;
        } else {
            self.acc = self.acc - (self.acc >> SHIFT) + sample as u32;
        }
        self.value()
    }

    pub fn value(&self) -> u16 {
        // round to nearest
        ((self.acc + (1 << SHIFT >> 1)) >> SHIFT) as u16
    }

    pub fn reset(&mut self) {
        self.primed = false;
        self.acc = 0;
    }
}

impl<const SHIFT: u32> Default for Smoother<SHIFT> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_clamped_and_linear() {
        assert_eq!(light_percent(0), 0);
        assert_eq!(light_percent(150), 0);
        assert_eq!(light_percent(1275), 50);
        assert_eq!(light_percent(2400), 100);
        assert_eq!(light_percent(3300), 100);
        assert_eq!(light_label(5), "dark");
        assert_eq!(light_label(50), "dim");
        assert_eq!(light_label(90), "bright");
    }

    #[test]
    fn smoother_starts_at_first_sample_and_converges() {
        let mut s = Smoother::<2>::new();
        assert_eq!(s.push(1000), 1000);
        assert_eq!(s.push(2000), 1250);
        for _ in 0..40 {
            s.push(2000);
        }
        assert_eq!(s.value(), 2000);
        s.reset();
        assert_eq!(s.push(10), 10);
    }

    #[test]
    fn smoother_damps_a_single_spike() {
        let mut s = Smoother::<3>::new();
        s.push(500);
        let after = s.push(2500);
        assert_eq!(after, 750);
    }
}
