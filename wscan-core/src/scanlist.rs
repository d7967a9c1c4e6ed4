//! Scan-list channel-list compression, transmitted to RouterOS as the
//! argument to `scan-list=` when the user supplies a `SCANLIST` command
//! (SPEC_FULL.md §4.3). Only consecutive, 5-MHz-spaced values compress into
//! an `a-b` range; everything else passes through as a literal,
//! comma-separated token.

/// Compresses a comma-delimited list of integer frequencies into ranges of
/// the form `a-b` wherever the list contains an unbroken run of values each
/// exactly 5 greater than the last. Non-numeric or non-multiple-of-5 tokens
/// are passed through untouched and never start or extend a run.
pub fn compress(input: &str) -> String {
    let mut output = String::new();
    let mut prev: i64 = 0;
    let mut last_written: i64 = 0;

    let flush_range = |output: &mut String, prev: i64, last_written: i64| {
        if last_written != prev {
            output.push_str(&format!("-{prev}"));
        }
    };

    for token in input.split(',') {
        if token.is_empty() {
            continue;
        }
        match token.parse::<i64>() {
            Ok(curr) if curr != 0 => {
                if prev == 0 {
                    if !output.is_empty() {
                        output.push(',');
                    }
                    output.push_str(token);
                    prev = curr;
                    last_written = curr;
                } else if prev != curr - 5 || curr % 5 != 0 {
                    flush_range(&mut output, prev, last_written);
                    output.push(',');
                    output.push_str(&curr.to_string());
                    last_written = curr;
                    prev = curr;
                } else {
                    prev = curr;
                }
            }
            _ => {
                flush_range(&mut output, prev, last_written);
                if !output.is_empty() {
                    output.push(',');
                }
                output.push_str(token);
                prev = 0;
                last_written = 0;
            }
        }
    }
    flush_range(&mut output, prev, last_written);
    output
}

/// Expands a compressed scan-list string back into the individual
/// frequencies it denotes. `a-b` ranges expand to every multiple of 5
/// between `a` and `b` inclusive; any other token is returned as-is.
pub fn expand(input: &str) -> Vec<String> {
    let mut out = Vec::new();
    for token in input.split(',') {
        if token.is_empty() {
            continue;
        }
        if let Some((a, b)) = token.split_once('-') {
            if let (Ok(start), Ok(end)) = (a.parse::<i64>(), b.parse::<i64>()) {
                if start != 0 && end >= start && (end - start) % 5 == 0 {
                    let mut v = start;
                    while v <= end {
                        out.push(v.to_string());
                        v += 5;
                    }
                    continue;
                }
            }
        }
        out.push(token.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s4_compresses_a_run_of_5ghz_channels() {
        assert_eq!(
            compress("5180,5185,5190,5195,5200,5745"),
            "5180-5200,5745"
        );
    }

    #[test]
    fn s4_leaves_non_multiple_of_5_24ghz_values_uncompressed() {
        assert_eq!(compress("2412,2417,2422"), "2412,2417,2422");
    }

    #[test]
    fn compress_is_idempotent() {
        let once = compress("5180,5185,5190,5195,5200,5745");
        let twice = compress(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn single_value_passes_through() {
        assert_eq!(compress("5180"), "5180");
    }

    #[test]
    fn expand_reverses_a_compressed_range() {
        assert_eq!(
            expand("5180-5200,5745"),
            vec!["5180", "5185", "5190", "5195", "5200", "5745"]
        );
    }

    #[test]
    fn expand_of_compress_is_a_superset_of_the_multiples_of_5() {
        let input = "5180,5185,5190,5195,5200,5745";
        let compressed = compress(input);
        let expanded = expand(&compressed);
        for token in input.split(',') {
            assert!(expanded.contains(&token.to_string()));
        }
    }
}
