fn main() {
    song_bracket_lib::run()
}
