use crate::minimize::{Minimizer, Reduction};
use crate::oracle::Oracle;
use crate::types::MinimizeStats;

/// ddmin-style delta-debugging minimizer.
///
/// Searches for a locally 1-minimal failing subset of the input by testing
/// removal of contiguous chunks at increasing granularity. Complements are
/// tried before isolated chunks, and any adopted reduction restarts the
/// sweep at partition count 2. Iterative on purpose: the fixed point is
/// reached with bounded stack regardless of input size.
#[derive(Debug, Default)]
pub struct DdminMinimizer;

impl Minimizer for DdminMinimizer {
    fn minimize<O: Oracle>(&self, input: &[u8], oracle: &mut O) -> Result<Reduction, O::Error> {
        let mut stats = MinimizeStats::default();

        // A target that fails on the empty input cannot be narrowed further.
        if test(oracle, &[], &mut stats)? {
            return Ok(Reduction {
                data: Vec::new(),
                stats,
            });
        }

        let mut data = input.to_vec();
        let mut n: usize = 2;

        while data.len() >= 2 {
            match sweep(oracle, &data, n, &mut stats)? {
                Some(reduced) => {
                    data = reduced;
                    stats.reductions += 1;
                    n = 2;
                }
                None => {
                    if n >= data.len() {
                        break;
                    }
                    n = (2 * n).min(data.len());
                }
            }
        }

        Ok(Reduction { data, stats })
    }
}

/// One left-to-right pass over the `n`-chunk partition of `data`. Returns
/// the first candidate that still fails, complement before chunk.
fn sweep<O: Oracle>(
    oracle: &mut O,
    data: &[u8],
    n: usize,
    stats: &mut MinimizeStats,
) -> Result<Option<Vec<u8>>, O::Error> {
    // Chunks of ceil(len / n) bytes; the tail chunk may be shorter and
    // trailing empty slots are skipped.
    let chunk_size = (data.len() + n - 1) / n;
    for i in 0..n {
        let start = i * chunk_size;
        if start >= data.len() {
            break;
        }
        let end = ((i + 1) * chunk_size).min(data.len());

        let mut complement = Vec::with_capacity(data.len() - (end - start));
        complement.extend_from_slice(&data[..start]);
        complement.extend_from_slice(&data[end..]);
        if test(oracle, &complement, stats)? {
            return Ok(Some(complement));
        }

        let chunk = data[start..end].to_vec();
        if test(oracle, &chunk, stats)? {
            return Ok(Some(chunk));
        }
    }
    Ok(None)
}

fn test<O: Oracle>(
    oracle: &mut O,
    candidate: &[u8],
    stats: &mut MinimizeStats,
) -> Result<bool, O::Error> {
    stats.oracle_calls += 1;
    oracle.reproduces(candidate)
}
