//! Gameplay packet handlers: block edits, movement, chat.
//!
//! All of these are ignored until the session is logged in.

use std::sync::Arc;

use classic_engine::world::position::BlockPos;

use crate::block;
use crate::chat;
use crate::events::Outcome;
use crate::extensions::LONGER_MESSAGES;
use crate::net::protocol::{Message, PlayerTeleport, SetBlockClient, MODE_CREATE, MODE_DESTROY, SELF_ID};
use crate::net::session::Session;

pub fn handle_set_block(session: &Arc<Session>, packet: SetBlockClient) {
    if !session.is_logged_in() {
        return;
    }
    let Some(entity) = session.entity() else {
        return;
    };
    let Some(level) = entity.level() else {
        return;
    };

    let pos = BlockPos::new(packet.x as i32, packet.y as i32, packet.z as i32);
    if !level.world().contains(pos) {
        return;
    }
    let revert = || session.send_block_change(pos, level.get_block(pos));

    if entity.location().distance_to(pos) > session.click_distance() {
        session.send_message("You can't build that far away.");
        revert();
        return;
    }

    match packet.mode {
        MODE_DESTROY => {
            let current = level.get_block(pos);
            if block::is_break_restricted(current) && !session.may_build_restricted() {
                session.send_message("You can't do that!");
                revert();
                return;
            }
            if let Outcome::Veto(_) = session.server().events.block_break(session, pos, current) {
                revert();
                return;
            }
            level.set_block(pos, block::AIR, true);
        }
        MODE_CREATE => {
            let placed = packet.block;
            if placed > block::max_for_level(session.custom_block_level()) {
                session.send_message("Invalid block!");
                revert();
                return;
            }
            if block::is_place_restricted(placed) && !session.may_build_restricted() {
                session.send_message("You can't do that!");
                revert();
                return;
            }
            if let Outcome::Veto(_) = session.server().events.block_place(session, pos, placed) {
                revert();
                return;
            }
            level.set_block(pos, placed, true);
        }
        other => {
            tracing::debug!("{} sent unknown set-block mode {}", session, other);
            revert();
        }
    }
}

pub fn handle_player_teleport(session: &Arc<Session>, packet: PlayerTeleport) {
    if !session.is_logged_in() || packet.id != SELF_ID {
        return;
    }
    let Some(entity) = session.entity() else {
        return;
    };

    let location = packet.pose.to_location();
    if location == entity.location() {
        return;
    }
    if !entity.move_to(location) {
        // Put the client back where we think it is.
        session.send_teleport(entity);
    }
}

pub fn handle_message(session: &Arc<Session>, packet: Message) {
    if !session.is_logged_in() {
        return;
    }

    let message = {
        let mut buffer = session.chat_buffer.lock().expect("session chat buffer poisoned");
        buffer.push_str(&packet.text);
        if packet.id != 0 && session.has_extension(LONGER_MESSAGES) {
            return;
        }
        std::mem::take(&mut *buffer)
    };

    if message.is_empty() {
        return;
    }
    if !chat::is_valid_message(&message) {
        session.send_message("Invalid message!");
        return;
    }

    match message.strip_prefix('/') {
        Some(command) => session.server().execute_command(session, command),
        None => session.server().broadcast_message(&format!(
            "{}<{}> {}",
            chat::WHITE,
            session.name(),
            chat::convert_colors(&message)
        )),
    }
}
