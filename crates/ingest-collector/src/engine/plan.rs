//! 수집 계획: 심볼별 윈도우와 조회 단위.

use ingest_core::CoverageWindow;
use serde::Serialize;

/// 심볼 하나의 수집 윈도우. `None`이면 이미 최신.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolPlan {
    pub symbol: String,
    pub window: Option<CoverageWindow>,
}

/// 한 번의 제공자 호출로 조회할 심볼 묶음.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchUnit {
    pub window: CoverageWindow,
    pub symbols: Vec<String>,
}

/// 계획을 조회 단위로 나눕니다.
///
/// 단일 심볼 데이터셋은 심볼마다 한 단위입니다. 다중 심볼 데이터셋은 윈도우가
/// 같은 심볼끼리 처음 등장한 순서대로 묶고 `max_batch_size`개씩 자릅니다.
pub fn group_units(plans: &[SymbolPlan], multistocks: bool, max_batch_size: usize) -> Vec<FetchUnit> {
    let pending = plans
        .iter()
        .filter_map(|p| p.window.map(|w| (w, p.symbol.as_str())));

    if !multistocks {
        return pending
            .map(|(window, symbol)| FetchUnit {
                window,
                symbols: vec![symbol.to_string()],
            })
            .collect();
    }

    let mut groups: Vec<(CoverageWindow, Vec<String>)> = Vec::new();
    for (window, symbol) in pending {
        match groups.iter_mut().find(|(w, _)| *w == window) {
            Some((_, symbols)) => symbols.push(symbol.to_string()),
            None => groups.push((window, vec![symbol.to_string()])),
        }
    }

    let batch_size = max_batch_size.max(1);
    groups
        .into_iter()
        .flat_map(|(window, symbols)| {
            symbols
                .chunks(batch_size)
                .map(|chunk| FetchUnit {
                    window,
                    symbols: chunk.to_vec(),
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
