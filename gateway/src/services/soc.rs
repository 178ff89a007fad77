//! Per-cell state-of-charge estimation from resting voltage.

/// Reference voltage-to-SoC curve at 25 C for Li-ion NMC in resting state,
/// ordered by descending voltage: (cell voltage V, state of charge %).
const REFERENCE_CURVE_25C: [(f64, f64); 19] = [
    (4.1689, 100.0),
    (4.0466, 84.5),
    (3.9969, 77.0),
    (3.9637, 70.8),
    (3.9306, 64.9),
    (3.9078, 59.1),
    (3.8767, 54.1),
    (3.8539, 47.9),
    (3.8352, 41.8),
    (3.8311, 36.6),
    (3.8104, 30.0),
    (3.8000, 25.2),
    (3.7606, 20.8),
    (3.7585, 15.9),
    (3.6943, 9.5),
    (3.6632, 5.3),
    (3.6135, 2.4),
    (3.4891, 0.8),
    (3.2881, 0.0),
];

/// Basic linear temperature compensation applied to the cell voltage before
/// the SoC lookup. Cold cells read low for a given SoC: -1.5 mV/C below 25 C.
fn temperature_corrected_voltage(voltage: f64, temp_c: f64) -> f64 {
    if temp_c < 25.0 {
        voltage + (25.0 - temp_c) * 0.0015
    } else {
        voltage
    }
}

/// Estimates a cell's state of charge (%) from its voltage and temperature
/// by linear interpolation over the 25 C reference curve, clamped to
/// [0, 100] outside the curve's voltage range.
pub fn estimate_cell_soc(voltage: f64, temp_c: f64) -> f64 {
    let v = temperature_corrected_voltage(voltage, temp_c);

    let (v_max, soc_max) = REFERENCE_CURVE_25C[0];
    let (v_min, soc_min) = REFERENCE_CURVE_25C[REFERENCE_CURVE_25C.len() - 1];
    if v >= v_max {
        return soc_max;
    }
    if v <= v_min {
        return soc_min;
    }

    for pair in REFERENCE_CURVE_25C.windows(2) {
        let (v_hi, soc_hi) = pair[0];
        let (v_lo, soc_lo) = pair[1];
        if v <= v_hi && v >= v_lo {
            let fraction = (v - v_lo) / (v_hi - v_lo);
            let soc = soc_lo + fraction * (soc_hi - soc_lo);
            return soc.clamp(0.0, 100.0);
        }
    }

    // unreachable given the range guards above
    0.0
}
