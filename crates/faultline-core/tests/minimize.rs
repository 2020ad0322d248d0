use faultline_core::{DdminMinimizer, Minimizer, Oracle, Reduction};

fn shrink(input: &[u8], mut oracle: impl FnMut(&[u8]) -> bool) -> Reduction {
    DdminMinimizer.minimize(input, &mut oracle).unwrap()
}

fn has_marker(candidate: &[u8]) -> bool {
    candidate.contains(&b'#')
}

#[test]
fn marker_input_converges_to_the_marker() {
    let reduction = shrink(b"ab#cd", has_marker);

    assert_eq!(reduction.data, b"#");
}

#[test]
fn uniform_input_converges_to_the_length_threshold() {
    let reduction = shrink(b"xxxxxxxx", |candidate| candidate.len() >= 4);

    assert_eq!(reduction.data, b"xxxx");
}

#[test]
fn minimized_input_still_fails() {
    let inputs: [&[u8]; 4] = [b"ab#cd", b"#", b"no marker at all####", b"x#x#x"];
    for input in inputs {
        let reduction = shrink(input, has_marker);

        assert!(has_marker(&reduction.data));
        assert!(reduction.data.len() <= input.len());
    }
}

#[test]
fn minimization_is_idempotent() {
    let once = shrink(b"ab#cd", has_marker);
    let twice = shrink(&once.data, has_marker);

    assert_eq!(twice.data, once.data);
}

#[test]
fn degenerate_oracle_reduces_to_empty() {
    let reduction = shrink(b"anything", |_candidate| true);

    assert_eq!(reduction.data, b"");
    assert_eq!(reduction.stats.oracle_calls, 1);
}

#[test]
fn empty_input_stays_empty() {
    let reduction = shrink(b"", has_marker);

    assert_eq!(reduction.data, b"");
}

#[test]
fn oracle_calls_are_counted() {
    let mut calls = 0u64;
    let reduction = DdminMinimizer
        .minimize(b"ab#cd", &mut |candidate: &[u8]| {
            calls += 1;
            candidate.contains(&b'#')
        })
        .unwrap();

    assert_eq!(reduction.stats.oracle_calls, calls);
}

struct BrokenOracle;

impl Oracle for BrokenOracle {
    type Error = String;

    fn reproduces(&mut self, input: &[u8]) -> Result<bool, Self::Error> {
        if input.is_empty() {
            Ok(false)
        } else {
            Err("target unavailable".to_string())
        }
    }
}

#[test]
fn oracle_errors_propagate() {
    let result = DdminMinimizer.minimize(b"ab#cd", &mut BrokenOracle);

    assert_eq!(result.unwrap_err(), "target unavailable");
}
