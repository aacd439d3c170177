//! Audio for discrete character events.
//!
//! Updated for Bevy 0.17

use bevy::audio::Volume;
use bevy::prelude::*;

/// Resource holding all loaded audio assets
#[derive(Resource)]
pub struct CharacterSounds {
    pub land: Handle<AudioSource>,
    pub hurt: Handle<AudioSource>,
    pub death: Handle<AudioSource>,
}

/// Marker for one-shot character sound entities
#[derive(Component)]
pub struct CharacterSound;

/// Load all audio assets on startup
pub fn setup_audio(mut commands: Commands, asset_server: Res<AssetServer>) {
    let land = asset_server.load("audio/sfx/land_thud.ogg");
    let hurt = asset_server.load("audio/sfx/hurt.ogg");
    let death = asset_server.load("audio/sfx/death.ogg");

    commands.insert_resource(CharacterSounds { land, hurt, death });
}

/// Fire-and-forget playback; the entity despawns when the clip ends.
pub fn play_one_shot(commands: &mut Commands, source: &Handle<AudioSource>, volume: f32) {
    commands.spawn((
        CharacterSound,
        AudioPlayer::new(source.clone()),
        PlaybackSettings::DESPAWN.with_volume(Volume::Linear(volume)),
    ));
}
