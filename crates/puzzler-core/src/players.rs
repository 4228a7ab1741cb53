//! Themes derived from who played the source game.

use std::collections::HashSet;

use strum::{AsRefStr, Display};

/// Number of players every source game must resolve to.
pub const PLAYERS_PER_GAME: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
pub enum PlayerTheme {
  /// At least one titled player.
  #[strum(serialize = "master")]
  Master,
  /// Both players titled.
  #[strum(serialize = "masterVsMaster")]
  MasterVsMaster,
  /// At least one player from the super-GM list.
  #[strum(serialize = "superGM")]
  SuperGm,
}

/// Player themes for a game. `titled` and `super_gms` must hold lowercase
/// ids; `players` are compared case-insensitively.
pub fn player_themes(
  players: &[String],
  titled: &HashSet<String>,
  super_gms: &HashSet<String>,
) -> Vec<PlayerTheme> {
  let lower: Vec<String> = players.iter().map(|p| p.to_lowercase()).collect();
  let masters = lower.iter().filter(|p| titled.contains(*p)).count();

  let mut themes = Vec::new();
  if masters > 0 {
    themes.push(PlayerTheme::Master);
  }
  if masters > 1 {
    themes.push(PlayerTheme::MasterVsMaster);
  }
  if lower.iter().any(|p| super_gms.contains(p)) {
    themes.push(PlayerTheme::SuperGm);
  }
  themes
}

#[cfg(test)]
mod tests {
  use super::*;

  fn set(ids: &[&str]) -> HashSet<String> { ids.iter().map(|s| (*s).to_owned()).collect() }

  fn players(a: &str, b: &str) -> Vec<String> { vec![a.to_owned(), b.to_owned()] }

  #[test]
  fn no_titled_players() {
    let themes = player_themes(&players("alice", "bob"), &set(&["carol"]), &set(&[]));
    assert!(themes.is_empty());
  }

  #[test]
  fn one_and_two_masters() {
    let titled = set(&["alice", "bob"]);
    assert_eq!(
      player_themes(&players("alice", "zed"), &titled, &set(&[])),
      [PlayerTheme::Master]
    );
    assert_eq!(
      player_themes(&players("alice", "bob"), &titled, &set(&[])),
      [PlayerTheme::Master, PlayerTheme::MasterVsMaster]
    );
  }

  #[test]
  fn super_gm_is_case_insensitive() {
    let themes = player_themes(&players("DrNykterstein", "bob"), &set(&["drnykterstein"]), &set(&["drnykterstein"]));
    assert_eq!(themes, [PlayerTheme::Master, PlayerTheme::SuperGm]);
  }

  #[test]
  fn theme_strings() {
    assert_eq!(PlayerTheme::MasterVsMaster.as_ref(), "masterVsMaster");
    assert_eq!(PlayerTheme::SuperGm.to_string(), "superGM");
  }
}
