//! Properties every PWM, scorer and mutant model must satisfy

use pwmfit::combination;
use pwmfit::{Combo, Ensemble, MutantParser, Order, PwmBuilder, ScoreParams, Sequence, WildTypeModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const ALPHABET: &[u8] = b"ACDEFG";

/// Random aligned ensemble; sequences mostly follow `template`
fn random_ensemble(seed: u64, template: &[u8], size: usize) -> Ensemble {
    let mut rng = StdRng::seed_from_u64(seed);
    let sequences = (0..size)
        .map(|_| {
            let residues: Vec<u8> = template
                .iter()
                .map(|&symbol| {
                    if rng.gen_bool(0.7) {
                        symbol
                    } else {
                        ALPHABET[rng.gen_range(0..ALPHABET.len())]
                    }
                })
                .collect();
            let weight = rng.gen_range(0.1..3.0);
            Sequence::new(residues, "x", weight)
        })
        .collect();
    Ensemble::new(sequences).unwrap()
}

#[test]
fn test_frequencies_form_distribution_per_position_tuple() {
    let ensemble = random_ensemble(11, b"ACDEFGA", 40);
    let positions: Vec<usize> = (0..7).collect();

    for order in Order::FOUR.up_to() {
        let pwm = PwmBuilder::new(order).build(&ensemble).unwrap();
        combination::for_each(&positions, order.get(), |tuple| {
            let total: f64 = pwm.entries_at(tuple).map(|(_, frequency)| frequency).sum();
            assert!((total - 1.0).abs() < 1e-9, "order {} {:?}: {}", order, tuple, total);
        });
    }
}

#[test]
fn test_parallel_build_gives_identical_scores() {
    let ensemble = random_ensemble(5, b"GADFECA", 60);
    let tests = random_ensemble(6, b"GADFECA", 10);
    let params = ScoreParams::default();

    for order in Order::FOUR.up_to() {
        let serial = PwmBuilder::new(order).build(&ensemble).unwrap();
        let parallel = PwmBuilder::new(order).parallel(true).build(&ensemble).unwrap();
        for sequence in tests.sequences() {
            assert_eq!(
                serial.score(&sequence.residues, &params).unwrap(),
                parallel.score(&sequence.residues, &params).unwrap()
            );
        }
    }
}

#[test]
fn test_wild_type_descriptor_round_trip() {
    let ensemble = random_ensemble(3, b"ACDEF", 30);
    let parser = MutantParser::new(b"ACDEF", 1);
    let wt = parser.parse("wt").unwrap();

    for order in Order::THREE.up_to() {
        let model = WildTypeModel::build(&ensemble, b"ACDEF", order, &ScoreParams::default()).unwrap();
        assert_eq!(model.evaluate(&wt).unwrap(), model.wt_score());
    }
}

#[test]
fn test_incremental_scores_match_full_tables() {
    let true_reference = b"ACdDEfFGA";
    let parser = MutantParser::new(true_reference, 100);
    let reference = parser.aligned_reference();
    assert_eq!(reference, b"ACDEFGA".to_vec());

    let ensemble = random_ensemble(21, &reference, 50);
    let descriptors = [
        "A100G",
        "C101A,D103C",
        "D103E,E104D",
        "G107A,A108G,A100D",
        "A100C,C101D,D103E,E104F,F106G",
        "A108A",
    ];

    for bias in [false, true] {
        let params = ScoreParams::default().with_bias(bias);
        for order in Order::THREE.up_to() {
            let model = WildTypeModel::build(&ensemble, &reference, order, &params).unwrap();
            let full = PwmBuilder::new(order).build(&ensemble).unwrap();
            for descriptor in descriptors {
                let mutant = parser.parse(descriptor).unwrap();
                assert!(mutant.is_valid(), "{}: {:?}", descriptor, mutant.issues());
                let expected = full.score(&mutant.apply(&reference).unwrap(), &params).unwrap();
                let actual = model.evaluate(&mutant).unwrap();
                assert!(
                    (actual - expected).abs() < 1e-8,
                    "order {} bias {} {}: {} vs {}",
                    order,
                    bias,
                    descriptor,
                    actual,
                    expected
                );
            }
        }
    }
}

#[test]
fn test_masking_map_is_monotone() {
    let reference = b"AbcDEfGhIJ";
    let masked = reference.iter().filter(|s| s.is_ascii_lowercase()).count();
    let parser = MutantParser::new(reference, 1);
    let map = parser.position_map();

    let entries: Vec<(usize, usize)> = map.entries().collect();
    assert_eq!(entries.len(), reference.len() - masked);
    assert!(entries.windows(2).all(|w| w[0].0 < w[1].0 && w[0].1 < w[1].1));
    assert_eq!(entries.last().map(|e| e.1), Some(reference.len() - masked - 1));

    for (i, &symbol) in reference.iter().enumerate() {
        if symbol.is_ascii_lowercase() {
            let descriptor = format!("{}{}A", symbol as char, i + 1);
            assert!(!parser.parse(&descriptor).unwrap().is_valid(), "{}", descriptor);
        }
    }
}

#[test]
fn test_two_position_example() {
    let ensemble = Ensemble::new(vec![
        Sequence::new(b"AA".to_vec(), "x", 1.0),
        Sequence::new(b"AC".to_vec(), "x", 1.0),
        Sequence::new(b"CA".to_vec(), "x", 2.0),
    ])
    .unwrap();
    let params = ScoreParams::new(1e-6);

    let order_one = PwmBuilder::new(Order::ONE).build(&ensemble).unwrap();
    assert_eq!(order_one.frequency(&Combo::new(&[0], b"A")), 0.5);
    assert_eq!(order_one.frequency(&Combo::new(&[0], b"C")), 0.5);
    assert_eq!(order_one.frequency(&Combo::new(&[1], b"A")), 0.75);
    assert_eq!(order_one.frequency(&Combo::new(&[1], b"C")), 0.25);

    let aa = order_one.score(b"AA", &params).unwrap();
    let cc = order_one.score(b"CC", &params).unwrap();
    assert!(aa.is_finite() && cc.is_finite());
    assert!(aa > cc);
    assert!((aa - 0.584_962_5).abs() < 1e-5, "{}", aa);
    assert!((cc + 1.0).abs() < 1e-5, "{}", cc);

    let order_two = PwmBuilder::new(Order::TWO).build(&ensemble).unwrap();
    assert_eq!(order_two.frequency_of(&[0, 1], b"AA"), 0.25);
    assert_eq!(order_two.frequency_of(&[0, 1], b"AC"), 0.25);
    assert_eq!(order_two.frequency_of(&[0, 1], b"CA"), 0.5);
}

#[test]
fn test_descriptor_mapping_example() {
    let parser = MutantParser::new(b"AbCd", 1);

    let a1g = parser.parse("A1G").unwrap();
    assert!(a1g.is_valid());
    assert_eq!(a1g.substitutions().collect::<Vec<_>>(), vec![(0, b'G')]);

    let c3g = parser.parse("C3G").unwrap();
    assert!(c3g.is_valid());
    assert_eq!(c3g.substitutions().collect::<Vec<_>>(), vec![(1, b'G')]);

    assert!(!parser.parse("B2X").unwrap().is_valid());
}
