use lab_core::{CancellationToken, ParameterGrid, Slot};
use tracing::info;

/// How an expansion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Completed { leaves: usize },
    Interrupted { leaves: usize },
}

impl Expansion {
    pub fn leaves(&self) -> usize {
        match self {
            Expansion::Completed { leaves } | Expansion::Interrupted { leaves } => *leaves,
        }
    }
}

/// Visits every leaf of `grid` depth-first, leftmost slot outermost.
///
/// `visit` runs synchronously on each leaf before the next one is produced.
/// Before a new candidate value of a swept slot is picked, the token is
/// checked and expansion stops once any interrupt has been requested.
pub fn expand_grid<F, E>(
    grid: &ParameterGrid,
    token: &CancellationToken,
    mut visit: F,
) -> Result<Expansion, E>
where
    F: FnMut(&[String]) -> Result<(), E>,
{
    let mut leaves = 0;
    let finished = expand_at(&grid.slots, &[], 1, token, &mut visit, &mut leaves)?;
    Ok(if finished {
        Expansion::Completed { leaves }
    } else {
        Expansion::Interrupted { leaves }
    })
}

fn expand_at<F, E>(
    remaining: &[Slot],
    prefix: &[String],
    depth: usize,
    token: &CancellationToken,
    visit: &mut F,
    leaves: &mut usize,
) -> Result<bool, E>
where
    F: FnMut(&[String]) -> Result<(), E>,
{
    let Some((slot, rest)) = remaining.split_first() else {
        visit(prefix)?;
        *leaves += 1;
        return Ok(true);
    };
    match slot {
        Slot::Fixed(value) => {
            let next = extend(prefix, value.as_str());
            expand_at(rest, &next, depth, token, visit, leaves)
        }
        Slot::Sweep(values) => {
            let listing = values
                .iter()
                .map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            for value in values {
                if token.is_interrupted() {
                    return Ok(false);
                }
                info!(depth = depth, "Picking {} from [{}]", value, listing);
                let next = extend(prefix, value.as_str());
                if !expand_at(rest, &next, depth + 1, token, visit, leaves)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }
}

fn extend(prefix: &[String], value: &str) -> Vec<String> {
    let mut next = Vec::with_capacity(prefix.len() + 1);
    next.extend_from_slice(prefix);
    next.push(value.to_string());
    next
}
