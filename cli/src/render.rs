use std::fmt::Write as _;

use anyhow::Result;
use ndarray::Array2;
use serde_json::json;
use sweeplog_core::*;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub fn info(session: &ReplaySession, table: &ValidityTable, json: bool) -> Result<()> {
    let replay = session.replay()?;
    let header = &replay.header;
    let metrics = session.metrics()?;
    let valid = session.is_within_validity(table)?;

    if json {
        return print_json(&json!({
            "header": header,
            "size": replay.layout.size(),
            "mines": replay.layout.mine_count(),
            "events": replay.events.len(),
            "valid": valid,
            "metrics": metrics,
        }));
    }

    let (rows, cols) = replay.layout.size();
    println!("format      {}", header.format.extension());
    println!("software    {}", header.software);
    println!("player      {}", header.player);
    println!(
        "board       {rows}x{cols}, {} mines ({:?})",
        replay.layout.mine_count(),
        header.level
    );
    if let Some(start) = header.start_time {
        println!("started     {}", format_micros(start));
    }
    println!("events      {}", replay.events.len());
    println!("valid       {}", if valid { "yes" } else { "no" });
    print_metrics(&metrics);
    Ok(())
}

pub fn bundle(bundle: EvfsBundle, json: bool) -> Result<()> {
    let consistent = bundle.is_consistent();
    let mut games = Vec::with_capacity(bundle.len());
    for entry in bundle.entries {
        let mut session = ReplaySession::from_replay(entry.replay);
        session.analyse()?;
        let metrics = session.metrics()?;
        games.push((entry.name, session.replay()?.header.player.clone(), metrics));
    }

    if json {
        let games: Vec<_> = games
            .iter()
            .map(|(name, player, metrics)| {
                json!({ "name": name, "player": player, "metrics": metrics })
            })
            .collect();
        return print_json(&json!({ "consistent": consistent, "games": games }));
    }

    for (name, player, metrics) in &games {
        println!(
            "{name:<24} {player:<16} {:>8.3}s  3bv {:>3}/{:<3} {:.3}/s",
            metrics.time, metrics.bbbv_solved, metrics.bbbv, metrics.bbbv_s
        );
    }
    println!("consistent  {}", if consistent { "yes" } else { "no" });
    Ok(())
}

pub fn seek(session: &ReplaySession, json: bool) -> Result<()> {
    let metrics = session.metrics()?;
    let (x, y) = session.cursor()?;
    let record = session.current_record()?;
    let board = &session.snapshot()?.board;

    if json {
        return print_json(&json!({
            "time": session.current_time(),
            "event": session.current_event(),
            "cursor": [x, y],
            "phase": record.phase,
            "mouse": record.mouse_state,
            "metrics": metrics,
            "board": grid_rows(&board.to_raw()),
        }));
    }

    println!(
        "t = {:.3}s, event {}, cursor ({x}, {y}), {:?}, {} mines left",
        session.current_time(),
        session.current_event(),
        record.phase,
        board.mines_left()
    );
    print_metrics(&metrics);
    println!();
    print!("{}", board_text(board.cells()));
    Ok(())
}

pub fn solve(classification: &Classification, json: bool) -> Result<()> {
    if json {
        return print_json(classification);
    }

    let safe: Vec<_> = classification.safe().collect();
    let mines: Vec<_> = classification.mines().collect();
    println!("safe          {safe:?}");
    println!("mines         {mines:?}");
    println!("uncertain     {:?}", classification.uncertain);
    if !classification.undetermined.is_empty() {
        println!("undetermined  {:?}", classification.undetermined);
    }
    for contradiction in &classification.contradictions {
        log::warn!("inconsistent board: {contradiction:?}");
    }
    println!();
    print!("{}", probability_text(&classification.probabilities));
    Ok(())
}

pub fn layout(layout: &MineLayout, seed: u64, json: bool) -> Result<()> {
    let numbers = layout.numbers();
    if json {
        return print_json(&json!({
            "seed": seed,
            "size": layout.size(),
            "mines": layout.mine_count(),
            "board": grid_rows(&numbers),
        }));
    }

    let mut out = String::new();
    for row in numbers.rows() {
        for &value in row {
            out.push(if value < 0 { '*' } else { digit(value as u8) });
        }
        out.push('\n');
    }
    print!("{out}");
    Ok(())
}

fn print_metrics(metrics: &Metrics) {
    println!("time        {:.3}s", metrics.time);
    println!(
        "3bv         {}/{} ({:.3}/s)",
        metrics.bbbv_solved, metrics.bbbv, metrics.bbbv_s
    );
    println!("op/isl      {}/{}", metrics.op, metrics.isl);
    println!(
        "clicks      {} ({} left, {} right, {} double)",
        metrics.cl, metrics.left, metrics.right, metrics.double
    );
    println!(
        "effective   {} ({} left, {} right, {} double)",
        metrics.ce, metrics.lce, metrics.rce, metrics.dce
    );
    println!(
        "ioe {:.3}  corr {:.3}  thrp {:.3}",
        metrics.ioe, metrics.corr, metrics.thrp
    );
    if metrics.stnb > 0.0 {
        println!("stnb        {:.3}", metrics.stnb);
    }
    println!("path        {:.1}px", metrics.path);
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn grid_rows<T: Copy>(grid: &Array2<T>) -> Vec<Vec<T>> {
    grid.rows().into_iter().map(|row| row.to_vec()).collect()
}

fn digit(value: u8) -> char {
    char::from_digit(value.into(), 10).unwrap_or('?')
}

fn board_text(cells: &Array2<CellState>) -> String {
    let mut out = String::new();
    for row in cells.rows() {
        for &cell in row {
            out.push(match cell {
                CellState::Covered => '.',
                CellState::Flagged => 'F',
                CellState::Mine => '*',
                CellState::Revealed(0) => ' ',
                CellState::Revealed(number) => digit(number),
            });
        }
        out.push('\n');
    }
    out
}

fn probability_text(probabilities: &Array2<f64>) -> String {
    let mut out = String::new();
    for row in probabilities.rows() {
        let line: Vec<_> = row.iter().map(|p| format!("{p:.2}")).collect();
        let _ = writeln!(out, "{}", line.join(" "));
    }
    out
}

fn format_micros(micros: u64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1000)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| micros.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn board_text_marks_each_state() {
        let cells = array![[
            CellState::Covered,
            CellState::Flagged,
            CellState::Revealed(0),
            CellState::Revealed(3),
            CellState::Mine
        ]];
        assert_eq!(board_text(&cells), ".F 3*\n");
    }

    #[test]
    fn timestamps_render_as_rfc3339() {
        assert_eq!(format_micros(1_666_124_135_606_000), "2022-10-18T20:15:35.606Z");
    }

    #[test]
    fn probabilities_keep_two_decimals() {
        let grid = array![[0.0, 0.5], [1.0, 0.3]];
        assert_eq!(probability_text(&grid), "0.00 0.50\n1.00 0.30\n");
    }
}
