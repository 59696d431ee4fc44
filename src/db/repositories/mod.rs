mod predictions;
mod settings;
