//! Constructor / factory-method candidate resolution.
//!
//! Rust has no reflection, so "the declared constructors of a class" is
//! instead an explicit `Vec<ConstructorCandidate>` registered alongside
//! the bean definition (see `arg::ConstructorCandidate`). This module
//! ranks candidates over that explicit list.

use std::any::Any;

use crate::arg::{Arg, ConstructorCandidate, ParamSpec, TypeKeyOwned};
use crate::convert::{parameter_weight, total_weight, ConversionRegistry, UNASSIGNABLE_WEIGHT};
use crate::error::DiError;

/// One parameter's resolved value and the weight it cost to resolve.
struct ResolvedParam {
    arg: Arg,
    weight: i64,
}

/// A candidate's resolution outcome: weight plus the argument list that
/// produced it (kept so the lowest-weight winner's arguments can be
/// reused directly by the creation engine).
pub struct Scored {
    pub candidate_index: usize,
    pub weight: i64,
    pub args: Vec<Arg>,
    pub raw: bool,
}

/// Resolves a single parameter against declared constructor arguments and
/// an autowire-by-type fallback. `lookup_by_index_or_type` is supplied by
/// the creation engine (it knows how to consult the `BeanDefinition`'s
/// declared `ConstructorArg`s and how to autowire by type).
///
/// A declared or autowired `Arg::Value` is weighed against the
/// parameter's declared type via `parameter_weight`: an exact runtime-type
/// match costs nothing, a registered converter's target costs a fixed
/// conversion penalty (and the value is converted now, so the winning
/// candidate's factory receives an already-converted argument), and
/// anything else is unassignable. A by-name `Arg::Ref` is trusted as an
/// exact match since its runtime type isn't known until the referenced
/// bean is actually created.
fn resolve_param(
    index: usize,
    spec: &ParamSpec,
    conversions: &ConversionRegistry,
    lookup: &mut dyn FnMut(usize, &ParamSpec) -> Result<Option<Arg>, DiError>,
) -> Result<ResolvedParam, DiError> {
    match lookup(index, spec)? {
        Some(Arg::Value(value)) => {
            let supplied = TypeKeyOwned {
                id: (*value).type_id(),
                name: "<supplied>",
            };
            let converter = conversions.find(spec.type_key);
            let weight = parameter_weight(spec.type_key, supplied, converter.is_some());
            if weight >= UNASSIGNABLE_WEIGHT || supplied.id == spec.type_key.id {
                return Ok(ResolvedParam { arg: Arg::Value(value), weight });
            }
            match converter.and_then(|c| c.convert(value.as_ref()).ok()) {
                Some(converted) => Ok(ResolvedParam { arg: Arg::Value(converted), weight }),
                None => Ok(ResolvedParam {
                    arg: Arg::Value(value),
                    weight: UNASSIGNABLE_WEIGHT,
                }),
            }
        }
        Some(arg) => Ok(ResolvedParam { arg, weight: 0 }),
        None if spec.required => Ok(ResolvedParam {
            arg: Arg::Autowired,
            weight: UNASSIGNABLE_WEIGHT,
        }),
        None => Ok(ResolvedParam {
            arg: Arg::Autowired,
            weight: 0,
        }),
    }
}

/// Ranks every registered candidate and returns the lowest-weight winner:
/// candidates with fewer parameters than `min_args` are dropped outright,
/// the remainder sorted public-before-non-public then by descending
/// parameter count, argument arrays built per parameter, weight computed
/// for both the converted and raw (−1024-biased) argument arrays, lowest
/// weight wins, ties are an ambiguity error in strict mode and "first
/// lowest-weight" in lenient mode.
pub fn resolve(
    candidates: &[ConstructorCandidate],
    lenient: bool,
    min_args: usize,
    conversions: &ConversionRegistry,
    mut lookup: impl FnMut(usize, usize, &ParamSpec) -> Result<Option<Arg>, DiError>,
) -> Result<Scored, DiError> {
    if candidates.is_empty() {
        return Err(DiError::Definition {
            bean: String::new(),
            message: "no constructor candidates registered".into(),
        });
    }

    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&idx| candidates[idx].params.len() >= min_args)
        .collect();
    if order.is_empty() {
        return Err(DiError::Definition {
            bean: String::new(),
            message: format!("no constructor candidate accepts at least {min_args} declared argument(s)"),
        });
    }
    order.sort_by(|&a, &b| {
        let ca = &candidates[a];
        let cb = &candidates[b];
        cb.is_public
            .cmp(&ca.is_public)
            .then(cb.params.len().cmp(&ca.params.len()))
    });

    let mut best: Option<Scored> = None;
    let mut tie_at_best = false;

    for &cand_idx in &order {
        let candidate = &candidates[cand_idx];
        let mut resolved = Vec::with_capacity(candidate.params.len());
        let mut ok = true;
        for (p_idx, spec) in candidate.params.iter().enumerate() {
            let mut bound = |index: usize, spec: &ParamSpec| lookup(cand_idx, index, spec);
            match resolve_param(p_idx, spec, conversions, &mut bound) {
                Ok(r) => resolved.push(r),
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        let weights: Vec<i64> = resolved.iter().map(|r| r.weight).collect();
        let args: Vec<Arg> = resolved.into_iter().map(|r| r.arg).collect();
        let raw = total_weight(&weights, true);
        let converted = total_weight(&weights, false);
        let (weight, is_raw) = if raw < converted {
            (raw, true)
        } else {
            (converted, false)
        };

        if weight >= UNASSIGNABLE_WEIGHT {
            continue;
        }

        match &best {
            None => {
                best = Some(Scored {
                    candidate_index: cand_idx,
                    weight,
                    args,
                    raw: is_raw,
                });
                tie_at_best = false;
            }
            Some(current) if weight < current.weight => {
                best = Some(Scored {
                    candidate_index: cand_idx,
                    weight,
                    args,
                    raw: is_raw,
                });
                tie_at_best = false;
            }
            Some(current) if weight == current.weight => {
                tie_at_best = true;
            }
            _ => {}
        }
    }

    match best {
        Some(scored) => {
            if tie_at_best && !lenient {
                return Err(DiError::Definition {
                    bean: String::new(),
                    message: "ambiguous constructor resolution: multiple candidates tie for lowest weight".into(),
                });
            }
            Ok(scored)
        }
        None => Err(DiError::Definition {
            bean: String::new(),
            message: "no constructor candidate could be satisfied".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::TypeKeyOwned;
    use std::sync::Arc;

    fn candidate(params: Vec<ParamSpec>) -> ConstructorCandidate {
        ConstructorCandidate {
            params,
            is_public: true,
            factory: Arc::new(|_args| Ok(Arc::new(()))),
        }
    }

    #[test]
    fn picks_highest_arity_candidate_when_all_satisfied() {
        let candidates = vec![
            candidate(vec![]),
            candidate(vec![ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
        ];
        let registry = ConversionRegistry::new();
        let scored = resolve(&candidates, true, 0, &registry, |_, _, _| {
            Ok(Some(Arg::Value(Arc::new(1u32))))
        })
        .unwrap();
        assert_eq!(scored.candidate_index, 1);
    }

    #[test]
    fn strict_mode_errors_on_tie() {
        let candidates = vec![
            candidate(vec![ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
            candidate(vec![ParamSpec {
                name: Some("b"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
        ];
        let registry = ConversionRegistry::new();
        let err = resolve(&candidates, false, 0, &registry, |_, _, _| {
            Ok(Some(Arg::Value(Arc::new(1u32))))
        })
        .unwrap_err();
        assert!(matches!(err, DiError::Definition { .. }));
    }

    #[test]
    fn lenient_mode_picks_first_tie_winner() {
        let candidates = vec![
            candidate(vec![ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
            candidate(vec![ParamSpec {
                name: Some("b"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
        ];
        let registry = ConversionRegistry::new();
        let scored = resolve(&candidates, true, 0, &registry, |_, _, _| {
            Ok(Some(Arg::Value(Arc::new(1u32))))
        })
        .unwrap();
        assert_eq!(scored.candidate_index, 0);
    }

    #[test]
    fn missing_required_parameter_is_unassignable() {
        let candidates = vec![candidate(vec![ParamSpec {
            name: Some("a"),
            type_key: TypeKeyOwned::of::<u32>(),
            required: true,
        }])];
        let registry = ConversionRegistry::new();
        let err = resolve(&candidates, true, 0, &registry, |_, _, _| Ok(None)).unwrap_err();
        assert!(matches!(err, DiError::Definition { .. }));
    }

    #[test]
    fn min_args_filters_out_lower_arity_candidates() {
        let candidates = vec![
            candidate(vec![ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            }]),
            candidate(vec![
                ParamSpec {
                    name: Some("a"),
                    type_key: TypeKeyOwned::of::<u32>(),
                    required: true,
                },
                ParamSpec {
                    name: Some("b"),
                    type_key: TypeKeyOwned::of::<u32>(),
                    required: true,
                },
            ]),
        ];
        let registry = ConversionRegistry::new();
        let scored = resolve(&candidates, true, 2, &registry, |_, _, _| {
            Ok(Some(Arg::Value(Arc::new(1u32))))
        })
        .unwrap();
        assert_eq!(scored.candidate_index, 1);
    }

    #[test]
    fn ambiguous_arity_resolves_by_actual_conversion_cost() {
        // ctor(int, String) vs ctor(String, int), declared args ["1", 2]:
        // the second candidate matches both parameters exactly (weight 0);
        // the first needs int<->String conversions that have no registered
        // converter and is excluded as unassignable.
        let int_string = candidate(vec![
            ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            },
            ParamSpec {
                name: Some("b"),
                type_key: TypeKeyOwned::of::<String>(),
                required: true,
            },
        ]);
        let string_int = candidate(vec![
            ParamSpec {
                name: Some("a"),
                type_key: TypeKeyOwned::of::<String>(),
                required: true,
            },
            ParamSpec {
                name: Some("b"),
                type_key: TypeKeyOwned::of::<u32>(),
                required: true,
            },
        ]);
        let candidates = vec![int_string, string_int];
        let registry = ConversionRegistry::new();
        let declared: Vec<Arg> = vec![
            Arg::Value(Arc::new("1".to_string())),
            Arg::Value(Arc::new(2u32)),
        ];
        let scored = resolve(&candidates, false, 2, &registry, |_, idx, _| Ok(Some(declared[idx].clone()))).unwrap();
        assert_eq!(scored.candidate_index, 1);
        assert_eq!(scored.weight, 0);
    }
}
