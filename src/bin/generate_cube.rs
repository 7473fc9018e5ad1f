use std::path::Path;

use cubelink::data::model::{Header, HeaderValue};
use cubelink::data::writer::write_cube;

const OUTPUT: &str = "sample_cube.fits";

// NAXIS1 (RA), NAXIS2 (Dec), NAXIS3 (frequency)
const AXES: [usize; 3] = [64, 64, 32];

/// Rest frequency of the HI line in Hz.
const HI_FREQ: f64 = 1.420_405_751_77e9;

struct Source {
    x: f64,
    y: f64,
    z: f64,
    sigma_xy: f64,
    sigma_z: f64,
    peak: f64,
}

impl Source {
    fn flux_at(&self, x: f64, y: f64, z: f64) -> f64 {
        let r2 = ((x - self.x).powi(2) + (y - self.y).powi(2)) / (2.0 * self.sigma_xy.powi(2));
        let s2 = (z - self.z).powi(2) / (2.0 * self.sigma_z.powi(2));
        self.peak * (-(r2 + s2)).exp()
    }
}

/// SplitMix64 stream with a cached second normal deviate.
struct NoiseSource {
    state: u64,
    spare: Option<f64>,
}

impl NoiseSource {
    /// Seeded from the cube shape, so a given geometry always yields the
    /// same cube.
    fn for_shape(axes: &[usize]) -> Self {
        let seed = axes
            .iter()
            .fold(0xCB_F2_9C_E4_84_22_23_25_u64, |h, &n| {
                (h ^ n as u64).wrapping_mul(0x100_0000_01B3)
            });
        NoiseSource {
            state: seed,
            spare: None,
        }
    }

    fn next_bits(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [0, 1).
    fn unit(&mut self) -> f64 {
        (self.next_bits() >> 11) as f64 * f64::EPSILON / 2.0
    }

    fn between(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.unit()
    }

    /// Marsaglia polar method; every second call uses the cached deviate.
    fn normal(&mut self, sigma: f64) -> f64 {
        if let Some(z) = self.spare.take() {
            return sigma * z;
        }
        loop {
            let u = 2.0 * self.unit() - 1.0;
            let v = 2.0 * self.unit() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                self.spare = Some(v * scale);
                return sigma * u * scale;
            }
        }
    }
}

fn random_sources(rng: &mut NoiseSource, count: usize, noise: f64) -> Vec<Source> {
    let [nx, ny, nz] = AXES.map(|n| n as f64);
    (0..count)
        .map(|_| Source {
            x: rng.between(8.0, nx - 8.0),
            y: rng.between(8.0, ny - 8.0),
            z: rng.between(4.0, nz - 4.0),
            sigma_xy: rng.between(1.5, 3.5),
            sigma_z: rng.between(1.0, 3.0),
            peak: rng.between(3.0, 10.0) * noise,
        })
        .collect()
}

fn wcs_header(source_count: usize, noise: f64) -> Header {
    let mut header = Header::new();
    let text = |s: &str| HeaderValue::Text(s.to_string());

    header.insert("BUNIT", text("Jy/beam"));
    header.insert("OBJECT", text("SYNTHETIC HI CUBE"));
    header.insert("EQUINOX", HeaderValue::Float(2000.0));
    header.insert("SPECSYS", text("BARYCENT"));
    header.insert("RESTFRQ", HeaderValue::Float(HI_FREQ));

    let axes = [
        ("RA---SIN", 180.0, -1.0 / 360.0),
        ("DEC--SIN", 30.0, 1.0 / 360.0),
        ("FREQ", HI_FREQ, -18_500.0),
    ];
    for (i, ((ctype, crval, cdelt), n)) in axes.into_iter().zip(AXES).enumerate() {
        let axis = i + 1;
        header.insert(format!("CTYPE{axis}"), text(ctype));
        header.insert(format!("CRVAL{axis}"), HeaderValue::Float(crval));
        header.insert(format!("CDELT{axis}"), HeaderValue::Float(cdelt));
        header.insert(format!("CRPIX{axis}"), HeaderValue::Float(n as f64 / 2.0 + 1.0));
    }
    header.insert("CUNIT3", text("Hz"));

    header.insert(
        "COMMENT",
        text(&format!(
            "Gaussian noise (sigma = {noise}) with {source_count} injected 3-D Gaussian sources"
        )),
    );
    header.insert("HISTORY", text("Created by generate_cube"));
    header
}

fn main() -> anyhow::Result<()> {
    let mut rng = NoiseSource::for_shape(&AXES);
    let noise = 0.002;
    let sources = random_sources(&mut rng, 6, noise);

    let [nx, ny, nz] = AXES;
    let mut values = Vec::with_capacity(nx * ny * nz);
    // NAXIS1 varies fastest on disk.
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let (xf, yf, zf) = (x as f64, y as f64, z as f64);
                let signal: f64 = sources.iter().map(|s| s.flux_at(xf, yf, zf)).sum();
                values.push((signal + rng.normal(noise)) as f32);
            }
        }
    }

    let header = wcs_header(sources.len(), noise);
    write_cube(Path::new(OUTPUT), &AXES, &values, &header)?;

    println!("Wrote {OUTPUT}");
    println!("  Axes:    {nx} x {ny} x {nz} ({} voxels)", values.len());
    println!("  Noise:   {noise} Jy/beam");
    println!("  Sources: {}", sources.len());
    for (i, s) in sources.iter().enumerate() {
        println!(
            "    #{}: x = {:.1}, y = {:.1}, z = {:.1}, peak = {:.4}",
            i + 1,
            s.x,
            s.y,
            s.z,
            s.peak
        );
    }
    Ok(())
}
