use modequant::{ClusterError, InitMethod, KMeansConfig, QuantizeConfig, UniformModeDistance};

fn gradient(width: usize, height: usize) -> Vec<rgb::RGB<u8>> {
    let mut pixels = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            pixels.push(rgb::RGB { r, g, b: 128 });
        }
    }
    pixels
}

#[test]
fn smoke_test_rgb() {
    let (width, height) = (32, 32);
    let pixels = gradient(width, height);

    let config = QuantizeConfig::default();
    let result = modequant::quantize(&pixels, width, height, &config).unwrap();

    assert_eq!(result.palette_len(), 16);
    assert_eq!(result.centroids().len(), 16);
    assert_eq!(result.indices().len(), width * height);
    for &idx in result.indices() {
        assert!((idx as usize) < result.palette_len());
    }
    assert!(result.mse() >= 0.0);
}

#[test]
fn all_init_methods() {
    let pixels: Vec<rgb::RGB<u8>> = (0..64)
        .map(|i| {
            let v = (i * 4) as u8;
            rgb::RGB { r: v, g: v, b: v }
        })
        .collect();

    let tuned = UniformModeDistance::new()
        .with_spread(0.5)
        .unwrap()
        .with_relax(0.5)
        .unwrap();
    for init in [
        InitMethod::Fft,
        InitMethod::Umdi,
        InitMethod::UmdiWith(tuned),
        InitMethod::Random { seed: 3 },
    ] {
        for parallel in [false, true] {
            let config = QuantizeConfig::new()
                .colors(8)
                .init(init)
                .kmeans(KMeansConfig::new().parallel(parallel));
            let result = modequant::quantize(&pixels, 8, 8, &config).unwrap();
            assert_eq!(result.palette_len(), 8, "init {init:?}");
            assert_eq!(result.indices().len(), 64);
        }
    }
}

#[test]
fn error_zero_dimension() {
    let pixels = vec![rgb::RGB { r: 0, g: 0, b: 0 }];
    let config = QuantizeConfig::default();

    assert!(matches!(
        modequant::quantize(&pixels, 0, 1, &config),
        Err(ClusterError::ZeroDimension)
    ));
    assert!(matches!(
        modequant::quantize(&pixels, 1, 0, &config),
        Err(ClusterError::ZeroDimension)
    ));
}

#[test]
fn error_buffer_size_mismatch() {
    let pixels = vec![rgb::RGB { r: 0, g: 0, b: 0 }; 10];
    let config = QuantizeConfig::default();

    assert_eq!(
        modequant::quantize(&pixels, 4, 4, &config).unwrap_err(),
        ClusterError::BufferSizeMismatch {
            len: 10,
            width: 4,
            height: 4
        }
    );
}

#[test]
fn error_overflowing_dimensions() {
    let pixels = vec![rgb::RGB { r: 0, g: 0, b: 0 }; 4];
    assert_eq!(
        modequant::quantize(&pixels, usize::MAX, 2, &QuantizeConfig::default()).unwrap_err(),
        ClusterError::BufferSizeMismatch {
            len: 4,
            width: usize::MAX,
            height: 2
        }
    );
    assert!(matches!(
        modequant::quantize_many(&pixels, 2, usize::MAX, &[2], &QuantizeConfig::default()),
        Err(ClusterError::BufferSizeMismatch { .. })
    ));
}

#[test]
fn error_invalid_color_count() {
    let pixels = vec![rgb::RGB { r: 0, g: 0, b: 0 }; 4];
    assert!(matches!(
        modequant::quantize(&pixels, 2, 2, &QuantizeConfig::new().colors(0)),
        Err(ClusterError::InvalidColorCount(0))
    ));
    assert!(matches!(
        modequant::quantize(&pixels, 2, 2, &QuantizeConfig::new().colors(257)),
        Err(ClusterError::InvalidColorCount(257))
    ));
}

#[test]
fn error_more_colors_than_unique() {
    let pixels = vec![rgb::RGB { r: 9, g: 9, b: 9 }; 4];
    let err = modequant::quantize(&pixels, 2, 2, &QuantizeConfig::new().colors(2)).unwrap_err();
    assert_eq!(err, ClusterError::TooManyClusters { k: 2, available: 1 });
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains('2') && err.to_string().contains('1'));
}

#[test]
fn single_color_image() {
    let pixels = vec![
        rgb::RGB {
            r: 128,
            g: 128,
            b: 128
        };
        64
    ];
    let config = QuantizeConfig::new().colors(1);
    let result = modequant::quantize(&pixels, 8, 8, &config).unwrap();

    assert_eq!(result.palette(), &[[128, 128, 128]]);
    assert!(result.indices().iter().all(|&i| i == 0));
    assert_eq!(result.mse(), 0.0);
}

#[test]
fn two_color_image() {
    let mut pixels = Vec::with_capacity(64);
    for i in 0..64 {
        if i < 32 {
            pixels.push(rgb::RGB { r: 0, g: 0, b: 0 });
        } else {
            pixels.push(rgb::RGB {
                r: 255,
                g: 255,
                b: 255,
            });
        }
    }

    let config = QuantizeConfig::new().colors(2).init(InitMethod::Fft);
    let result = modequant::quantize(&pixels, 8, 8, &config).unwrap();
    assert_eq!(result.palette(), &[[0, 0, 0], [255, 255, 255]]);
    assert_eq!(result.mse(), 0.0);

    let black_idx = result.indices()[0];
    assert!(result.indices()[..32].iter().all(|&i| i == black_idx));
    let white_idx = result.indices()[32];
    assert_ne!(black_idx, white_idx);
    assert!(result.indices()[32..].iter().all(|&i| i == white_idx));
}

#[test]
fn render_uses_palette() {
    let pixels = gradient(16, 16);
    let result =
        modequant::quantize(&pixels, 16, 16, &QuantizeConfig::new().colors(6)).unwrap();
    let rendered = result.render();
    assert_eq!(rendered.len(), pixels.len());
    for (px, &idx) in rendered.iter().zip(result.indices()) {
        let [r, g, b] = result.palette()[idx as usize];
        assert_eq!(*px, rgb::RGB { r, g, b });
    }
}

#[test]
fn quantize_many_matches_individual_runs() {
    let pixels = gradient(16, 16);
    let config = QuantizeConfig::new().init(InitMethod::Fft);
    let colors = [2, 4, 8];
    let many = modequant::quantize_many(&pixels, 16, 16, &colors, &config).unwrap();
    assert_eq!(many.len(), colors.len());

    for (result, &k) in many.iter().zip(&colors) {
        let single = modequant::quantize(&pixels, 16, 16, &config.clone().colors(k)).unwrap();
        assert_eq!(result.palette(), single.palette());
        assert_eq!(result.indices(), single.indices());
        assert_eq!(result.mse(), single.mse());
    }
}

#[test]
fn quantize_many_validates_every_count() {
    let pixels = gradient(4, 4);
    let config = QuantizeConfig::default();
    assert!(matches!(
        modequant::quantize_many(&pixels, 4, 4, &[4, 0], &config),
        Err(ClusterError::InvalidColorCount(0))
    ));
}

#[test]
fn timings_are_recorded() {
    let pixels = gradient(16, 16);
    let result = modequant::quantize(&pixels, 16, 16, &QuantizeConfig::default()).unwrap();
    let t = result.timings();
    assert!(t.total() >= t.k_means);
    assert!(t.total() >= t.unique_mapping);
}
