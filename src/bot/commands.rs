use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

/// Every slash command the bot answers to.
pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        remove_command(),
        queue_command(),
        pause_command(),
        skip_command(),
        loop_command(),
    ]
}

/// Registers the commands globally.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the commands on one guild; changes show up immediately there.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or playlist in your voice channel")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "URL or search terms")
                .required(true),
        )
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a song from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "index",
                "Position shown by /queue (0 is the song playing now)",
            )
            .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the queue")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pause or resume the current song")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current song")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop").description("Toggle loop mode for the queue")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_unique() {
        let names: Vec<String> = all_commands()
            .into_iter()
            .map(|command| {
                serde_json::to_value(&command).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();

        assert_eq!(names, vec!["play", "remove", "queue", "pause", "skip", "loop"]);
    }

    #[test]
    fn play_requires_a_query() {
        let play = serde_json::to_value(play_command()).unwrap();
        assert_eq!(play["options"][0]["name"], "query");
        assert_eq!(play["options"][0]["required"], true);
    }
}
