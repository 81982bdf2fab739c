//! # Audio Module
//!
//! Per-channel playback orchestration: queues, the playback loop and the
//! control signals that interrupt it.
//!
//! ## Architecture
//!
//! ### [`session`] - Playback Sessions
//! - One [`session::PlaybackSession`] per voice channel, created on first use
//! - Queue, playing flag and loop flag behind a single lock
//!
//! ### [`driver`] - Playback Loop
//! - Streams the front track until it ends or is skipped
//! - Advances the queue, requeues in loop mode, releases unreferenced audio
//! - Absorbs dropped voice connections with a bounded backoff
//!
//! ### [`signal`] - Control Signals
//! - Pause toggles and skips as a rendezvous with the live driver
//! - Every send is bounded by a timeout
//!
//! ### [`acquisition`] - Downloads
//! - Downloads resolved tracks in order and returns once the first is ready
//!
//! ### [`player`] - Public Surface
//! - `play`, `remove`, `list_queue`, `pause`, `skip`, `toggle_loop`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use channel_music::audio::player::{MusicPlayer, PlayRequest};
//! # use channel_music::audio::driver::PlaybackSinks;
//! use serenity::all::ChannelId;
//!
//! # async fn example(player: MusicPlayer, sinks: PlaybackSinks) -> channel_music::error::Result<()> {
//! let channel = ChannelId::new(123456789);
//!
//! player.play(channel, PlayRequest::Query("never gonna give you up".into()), sinks).await?;
//!
//! // Control playback
//! player.pause(channel).await?; // pauses
//! player.pause(channel).await?; // resumes
//! player.skip(channel).await?;
//! # Ok(())
//! # }
//! ```

pub mod acquisition;
pub mod driver;
pub mod ledger;
pub mod player;
pub mod queue;
pub mod session;
pub mod signal;
pub mod track;
pub mod transport;
